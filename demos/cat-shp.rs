use std::env;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use shpread::read::shapefile;

/// Prints every feature of the given .shp file, one per line.
fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let mut args = env::args();

    if args.len() != 2 {
        writeln!(&mut io::stderr(), "Usage: {} <SHP_PATH>", args.next().unwrap_or_default()).ok();
        process::exit(1);
    }

    args.next();
    let path = match args.next() {
        Some(arg) => PathBuf::from(arg),
        None => process::exit(1),
    };

    match shapefile::open_windows1252(&path) {
        Err(err) => {
            writeln!(&mut io::stderr(), "{}", err).ok();
            process::exit(1);
        }
        Ok(mut reader) => {
            let mut n_features: usize = 0;
            let mut n_skipped: usize = 0;

            for i in 0..reader.shape_count() {
                match reader.feature(i) {
                    None => n_skipped += 1,
                    Some(feature) => {
                        n_features += 1;
                        println!("{}", feature);
                    }
                }
            }

            println!("Read {} features ({} unreadable)", n_features, n_skipped);
            reader.close();
        }
    }
}
