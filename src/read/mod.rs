pub mod shapefile;
