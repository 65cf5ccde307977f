pub(crate) mod parser;
pub(crate) mod writer;

/// Column headers of a config CSV file.
pub(crate) const HEADER: [&str; 2] = ["field", "value"];

/// The field names, in record order.
pub(crate) const WHITE_CORRECTION: &str = "white_correction";
pub(crate) const MY_ADDRESS: &str = "my_address";
pub(crate) const HEAT_LIMIT: &str = "heat_limit";
pub(crate) const PHYSICAL_LED: &str = "physical_led";
pub(crate) const LED_COLOR: &str = "led_color";
