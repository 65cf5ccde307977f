use vl_config_store::{Color, ConfigRecord, LegalColor};

use crate::ConfigPage;
use crate::csv::{HEAT_LIMIT, LED_COLOR, MY_ADDRESS, PHYSICAL_LED, WHITE_CORRECTION};
use crate::error::Error;

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    field: String,
    value: String,
}

/// Parse config CSV content from a string into a [`ConfigPage`].
pub(crate) fn parse_csv(content: &str) -> Result<ConfigPage, Error> {
    let mut record = ConfigRecord::default();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut seen: Vec<String> = vec![];

    for result in reader.deserialize() {
        let row: CsvRow = result?;

        if seen.contains(&row.field) {
            return Err(Error::DuplicateField(row.field));
        }
        parse_row(&mut record, &row)?;
        seen.push(row.field);
    }

    Ok(ConfigPage { record })
}

fn parse_row(record: &mut ConfigRecord, row: &CsvRow) -> Result<(), Error> {
    match row.field.as_str() {
        WHITE_CORRECTION => {
            parse_array(WHITE_CORRECTION, &row.value, &mut record.white_correction, parse_number)
        }
        MY_ADDRESS => {
            record.my_address = parse_number(&row.value)?;
            Ok(())
        }
        HEAT_LIMIT => parse_array(HEAT_LIMIT, &row.value, &mut record.heat_limit, parse_number),
        PHYSICAL_LED => {
            parse_array(PHYSICAL_LED, &row.value, &mut record.physical_led, parse_number)
        }
        LED_COLOR => parse_array(LED_COLOR, &row.value, &mut record.led_color, parse_color),
        _ => Err(Error::UnknownField(row.field.clone())),
    }
}

/// Array values are whitespace separated. A single value fills the whole array.
fn parse_array<T: Copy, const N: usize>(
    field: &'static str,
    value: &str,
    out: &mut [T; N],
    parse: impl Fn(&str) -> Result<T, Error>,
) -> Result<(), Error> {
    let items: Vec<&str> = value.split_whitespace().collect();

    match items.len() {
        1 => out.fill(parse(items[0])?),
        n if n == N => {
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = parse(item)?;
            }
        }
        found => {
            return Err(Error::InvalidLength {
                field,
                expected: N,
                found,
            });
        }
    }

    Ok(())
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number<T: TryFrom<u64>>(value: &str) -> Result<T, Error> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        value.parse::<u64>()
    };

    parsed
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| Error::InvalidValue(format!("{value} is not a valid number for this field")))
}

/// A colour name, or eight hex digits `RRGGBBWW` with an optional `0x` prefix.
fn parse_color(value: &str) -> Result<Color, Error> {
    if let Ok(named) = value.parse::<LegalColor>() {
        return Ok(named.into());
    }

    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let bytes = hex::decode(digits)?;
    let [red, green, blue, white]: [u8; 4] = bytes.try_into().map_err(|_| {
        Error::InvalidValue(format!("colour {value} must be a name or 8 hex digits"))
    })?;

    Ok(Color::from_channels(red, green, blue, white))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vl_config_store::{HEAT_SENSOR_COUNT, MODULE_LENGTH};

    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number::<u16>("0xFD").unwrap(), 0xFD);
        assert_eq!(parse_number::<u16>("253").unwrap(), 0xFD);
        assert_eq!(parse_number::<u8>("15").unwrap(), 15);
        assert!(parse_number::<u8>("256").is_err());
        assert!(parse_number::<u16>("-1").is_err());
        assert!(parse_number::<u16>("0xG").is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("green").unwrap(), Color::GREEN);
        assert_eq!(parse_color("FF000000").unwrap(), Color::RED);
        assert_eq!(parse_color("0x000000ff").unwrap(), Color::WHITE);
        assert_eq!(
            parse_color("01020304").unwrap(),
            Color::from_channels(1, 2, 3, 4)
        );
        assert!(matches!(parse_color("purple"), Err(Error::HexError(_))));
        assert!(matches!(parse_color("FF00"), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn arrays() {
        let mut limits = [0u16; HEAT_SENSOR_COUNT];
        parse_array(HEAT_LIMIT, "100", &mut limits, parse_number).unwrap();
        assert_eq!(limits, [100; HEAT_SENSOR_COUNT]);

        parse_array(HEAT_LIMIT, "1 2  3\t4", &mut limits, parse_number).unwrap();
        assert_eq!(limits, [1, 2, 3, 4]);

        let mut leds = [0u8; MODULE_LENGTH];
        assert!(matches!(
            parse_array(PHYSICAL_LED, "1 2 3", &mut leds, parse_number),
            Err(Error::InvalidLength {
                field: PHYSICAL_LED,
                expected: MODULE_LENGTH,
                found: 3
            })
        ));
    }

    #[test]
    fn omitted_fields_keep_defaults() {
        let page = parse_csv("field,value\nmy_address,0x10\n").unwrap();
        let mut expected = ConfigRecord::default();
        expected.my_address = 0x10;
        assert_eq!(page.record, expected);
    }

    #[test]
    fn rejects_unknown_and_duplicate_fields() {
        assert!(matches!(
            parse_csv("field,value\nbrightness,1\n"),
            Err(Error::UnknownField(f)) if f == "brightness"
        ));
        assert!(matches!(
            parse_csv("field,value\nmy_address,1\nmy_address,2\n"),
            Err(Error::DuplicateField(f)) if f == MY_ADDRESS
        ));
    }
}
