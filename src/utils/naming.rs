//! Names of the files produced by a dump.

use chrono::{DateTime, TimeZone};

/// Name of the memory image for the `[start, end]` range dumped at `at`.
pub fn dump_file_name<Tz: TimeZone>(start: u64, end: u64, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.img", stem(start, end, at))
}

/// Name of the resume log matching [`dump_file_name`].
pub fn log_file_name<Tz: TimeZone>(start: u64, end: u64, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.log", stem(start, end, at))
}

fn stem<Tz: TimeZone>(start: u64, end: u64, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{} 0x{:x} 0x{:x}", at.format("%Y-%m-%dT%H:%M:%S"), start, end)
}

#[test]
fn names_carry_timestamp_and_range() {
    use chrono::Utc;

    let at = Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap();
    assert_eq!(
        dump_file_name(0x8000_0000, 0x8000_fff0, &at),
        "2021-03-14T15:09:26 0x80000000 0x8000fff0.img"
    );
    assert_eq!(
        log_file_name(0x1000, 0x2000, &at),
        "2021-03-14T15:09:26 0x1000 0x2000.log"
    );
}
