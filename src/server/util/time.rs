use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) mod helper {
    #[cfg(not(test))]
    pub use super::get_utc_now;
    #[cfg(test)]
    pub use super::mock_chrono::get_utc_now;
}

/// RFC 3339 rendering with an explicit `Z`, so clients cannot mistake the
/// instant for local time.
pub(crate) fn rfc3339_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
pub(crate) mod mock_chrono {
    use chrono::DateTime;
    use std::cell::Cell;

    thread_local! {
        static MOCK_NOW: Cell<i64> = const { Cell::new(0) };
    }

    /// pin the mock clock to a unix timestamp for the current test thread
    pub fn set_utc_now(secs: i64) {
        MOCK_NOW.with(|now| now.set(secs));
    }

    pub fn get_utc_now() -> DateTime<chrono::Utc> {
        MOCK_NOW
            .with(|now| DateTime::<chrono::Utc>::from_timestamp(now.get(), 0))
            .expect("invalid timestamp")
    }
}

#[cfg(not(test))]
pub fn get_utc_now() -> DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_is_settable_per_thread() {
        mock_chrono::set_utc_now(1_709_269_140); // 2024-03-01T04:59:00Z
        let now = helper::get_utc_now();
        assert_eq!(now.to_rfc3339(), "2024-03-01T04:59:00+00:00");
    }

    #[test]
    fn instants_render_with_an_explicit_offset() {
        mock_chrono::set_utc_now(1_709_269_140);
        assert_eq!(rfc3339_utc(helper::get_utc_now()), "2024-03-01T04:59:00Z");
    }
}
