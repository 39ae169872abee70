use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use tracing::debug;

use crate::shared::AppState;
use crate::tasks::{read_input, write_output, Result, TaskRequest};

const DEFAULT_INPUT: &str = "/data/dates.txt";
const DEFAULT_OUTPUT: &str = "/data/dates-wednesdays.txt";

/// Date formats seen in the generated dates file. Lines that match none of
/// them are skipped rather than failing the whole task.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%b %d, %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S"];

fn parse_date(line: &str) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(line, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(line, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Count the Wednesdays in a file of one-date-per-line text and write the
/// count to the output file.
pub async fn count_wednesdays(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, DEFAULT_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, DEFAULT_OUTPUT))?;

    let contents = read_input(&input).await?;

    let mut count = 0u32;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_date(line) {
            Some(date) if date.weekday() == Weekday::Wed => count += 1,
            Some(_) => {}
            None => debug!(%line, "skipping unparseable date line"),
        }
    }

    write_output(&output, count.to_string()).await?;

    Ok(format!(
        "Counted {} Wednesdays in {} and wrote the count to {}",
        count,
        input.display(),
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(parse_date("2024-01-03"), Some(expected));
        assert_eq!(parse_date("03-Jan-2024"), Some(expected));
        assert_eq!(parse_date("Jan 03, 2024"), Some(expected));
        assert_eq!(parse_date("2024/01/03 09:30:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[tokio::test]
    async fn three_wednesdays_write_three() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::shared::state::test_state(dir.path());

        // 2024-01-03, -10 and -17 are consecutive Wednesdays
        std::fs::write(
            dir.path().join("dates.txt"),
            "2024-01-03\n2024-01-10\n2024-01-17\n2024-01-18\n",
        )
        .unwrap();

        let req = TaskRequest {
            task: "Count the number of Wednesdays in dates.txt",
            email: None,
            paths: vec!["dates.txt".to_string(), "out.txt".to_string()],
        };

        count_wednesdays(&state, &req).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "3");
    }
}
