use crate::LoggingError;
use time::UtcOffset;

/// Create a UtcOffset from whole hours.
///
/// # Examples
///
/// ```
/// use logger::utc_offset_hours;
///
/// let jakarta = utc_offset_hours(7).unwrap();
/// assert_eq!(jakarta.whole_hours(), 7);
/// assert!(utc_offset_hours(30).is_err());
/// ```
pub fn utc_offset_hours(hours: i8) -> Result<UtcOffset, LoggingError> {
    utc_offset_hms(hours, 0, 0)
}

/// Create a UtcOffset from hours, minutes and seconds.
///
/// # Examples
///
/// ```
/// use logger::utc_offset_hms;
///
/// let india = utc_offset_hms(5, 30, 0).unwrap();
/// assert_eq!(india.minutes_past_hour(), 30);
/// ```
pub fn utc_offset_hms(hours: i8, minutes: i8, seconds: i8) -> Result<UtcOffset, LoggingError> {
    UtcOffset::from_hms(hours, minutes, seconds)
        .map_err(|e| LoggingError::InvalidUtcOffset(e.to_string()))
}
