use std::fmt::Display;
use std::path::Path;

use csv::Writer;
use vl_config_store::Color;

use crate::ConfigPage;
use crate::csv::{HEADER, HEAT_LIMIT, LED_COLOR, MY_ADDRESS, PHYSICAL_LED, WHITE_CORRECTION};
use crate::error::Error;

/// Serialize a config page to a CSV file at the given `output_path`.
pub(crate) fn write_csv<P: AsRef<Path>>(page: &ConfigPage, output_path: P) -> Result<(), Error> {
    let mut wtr = Writer::from_path(output_path)?;
    write_records(&mut wtr, page)
}

/// Serialize a config page to CSV and return the content as a `String`.
pub(crate) fn write_csv_content(page: &ConfigPage) -> Result<String, Error> {
    let mut wtr = Writer::from_writer(Vec::new());
    write_records(&mut wtr, page)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidValue(format!("CSV output is not valid UTF-8: {}", e)))
}

fn write_records<W: std::io::Write>(wtr: &mut Writer<W>, page: &ConfigPage) -> Result<(), Error> {
    let record = &page.record;

    let white_correction = join(record.white_correction.iter().map(|v| format!("{v:#06x}")));
    let my_address = format!("{:#06x}", record.my_address);
    let heat_limit = join(record.heat_limit.iter());
    let physical_led = join(record.physical_led.iter());
    let led_color = join(record.led_color.iter().map(color_str));

    wtr.write_record(HEADER)?;
    wtr.write_record([WHITE_CORRECTION, white_correction.as_str()])?;
    wtr.write_record([MY_ADDRESS, my_address.as_str()])?;
    wtr.write_record([HEAT_LIMIT, heat_limit.as_str()])?;
    wtr.write_record([PHYSICAL_LED, physical_led.as_str()])?;
    wtr.write_record([LED_COLOR, led_color.as_str()])?;
    wtr.flush()?;

    Ok(())
}

fn join<T: Display>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

fn color_str(color: &Color) -> String {
    match color.legal() {
        Some(named) => named.to_string(),
        None => hex::encode_upper(color.channels()),
    }
}
