//! Drivers module
//!
//! One module per Click board. Each owns its bus handle and pins.

pub mod sensor_trait;

pub mod altitude2; // MS5607 barometer
pub mod audioamp; // LM48100Q amplifier
pub mod barometer; // LPS25HB
pub mod buzz;
pub mod dcmotor3; // TB6549
pub mod eeprom; // AT24C08
pub mod eth_wiz; // W5500
pub mod gnssrtk4; // NMEA receiver
pub mod hallcurrent; // ACS711 + MCP3221
pub mod ibutton; // DS1990A reader
pub mod relay;
pub mod rtc6; // MCP79411
pub mod servo2;
pub mod thermo; // MAX31855
pub mod thermo2; // DS1825
