pub mod fleet_backend;
