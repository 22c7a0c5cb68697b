pub mod buzz_api;
pub mod gnss_api; // GGA fix tracking
pub mod ibutton_api;
