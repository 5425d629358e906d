pub mod geocoding;
