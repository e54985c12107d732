use bulkpost_core::config::ValidationConfig;
use bulkpost_core::flair::{FlairPolicyEngine, FlairPolicyTable};
use bulkpost_core::model::{CellValue, RawRow};
use bulkpost_core::validate::{parse_destinations, parse_scheduled_time, RowValidator};
use chrono::{DateTime, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

fn validator() -> RowValidator {
    let engine = FlairPolicyEngine::new(FlairPolicyTable::builtin()).unwrap();
    RowValidator::new(engine, ValidationConfig::default())
}

fn valid_row() -> RawRow {
    RawRow::new()
        .with("title", "Release notes for 2.0")
        .with("content", "Everything that changed")
        .with("subreddit", "rust")
        .with("scheduled_time", "2030-07-01 09:30")
        .with("nsfw", "false")
        .with("spoiler", "FALSE")
        .with("auto_delete_hours", "24")
        .with("auto_delete_score", "0")
}

#[test]
fn test_valid_row_projects_to_draft() {
    let draft = validator()
        .project(&valid_row(), 0, now())
        .expect("row should be valid");

    assert_eq!(draft.title, "Release notes for 2.0");
    assert_eq!(draft.destinations, vec!["rust".to_string()]);
    assert_eq!(
        draft.scheduled_for,
        Some(Utc.with_ymd_and_hms(2030, 7, 1, 9, 30, 0).unwrap())
    );
    assert!(!draft.is_nsfw);
    assert!(!draft.is_spoiler);
    assert_eq!(draft.auto_delete_after_hours, Some(24.0));
    assert_eq!(draft.auto_delete_below_score, Some(0.0));
    assert!(draft.flair().is_none());
}

#[test]
fn test_empty_title_always_reported() {
    let row = RawRow::new()
        .with("title", "   ")
        .with("subreddit", "rust")
        .with("nsfw", "maybe");

    let outcome = validator().validate_at(&row, 4, now());
    assert_eq!(outcome.row_index, 4);
    assert!(!outcome.valid);
    assert!(outcome.errors.contains(&"Title is required".to_string()));
    assert!(outcome.errors.contains(&"NSFW must be true or false".to_string()));
}

#[test]
fn test_errors_accumulate_in_rule_order() {
    let row = RawRow::new()
        .with("title", "")
        .with("scheduled_time", "next tuesday")
        .with("auto_delete_hours", "soon")
        .with("auto_delete_score", "high")
        .with("nsfw", "yes")
        .with("spoiler", "no");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(
        outcome.errors,
        vec![
            "Title is required",
            "Destination is required",
            "Invalid scheduled time format",
            "Auto delete hours must be a number",
            "Auto delete score must be a number",
            "NSFW must be true or false",
            "Spoiler must be true or false",
        ]
    );
}

#[test]
fn test_title_length_limit() {
    let at_limit = valid_row();
    let mut row = RawRow::new().with("title", &"a".repeat(300));
    for (column, value) in at_limit.cells().iter().skip(1) {
        row.push(column.clone(), value.clone());
    }
    assert!(validator().validate_at(&row, 0, now()).valid);

    let too_long = RawRow::new()
        .with("title", &"é".repeat(301))
        .with("subreddit", "rust");
    let outcome = validator().validate_at(&too_long, 0, now());
    assert_eq!(outcome.errors, vec!["Title exceeds 300 characters"]);
}

#[test]
fn test_past_schedule_reports_only_future_error() {
    let row = RawRow::new()
        .with("title", "Old news")
        .with("subreddit", "rust")
        .with("scheduled_time", "2020-01-01 10:00");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["Scheduled time must be in the future"]);
}

#[test]
fn test_schedule_equal_to_now_is_not_future() {
    let row = RawRow::new()
        .with("title", "Right now")
        .with("subreddit", "rust")
        .with("scheduled_time", "2030-06-01T12:00:00Z");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["Scheduled time must be in the future"]);
}

#[test]
fn test_missing_optional_columns_are_fine() {
    let row = RawRow::new().with("title", "Just a title").with("subreddit", "rust");
    assert!(validator().validate_at(&row, 0, now()).valid);
}

#[test]
fn test_negative_auto_delete_hours_rejected() {
    let row = RawRow::new()
        .with("title", "Temporary")
        .with("subreddit", "rust")
        .with("auto_delete_hours", "-3")
        .with("auto_delete_score", "-10");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["Auto delete hours must not be negative"]);
}

#[test]
fn test_workbook_cells_are_rendered_as_text() {
    let mut row = RawRow::new().with("title", "Typed cells").with("subreddit", "rust");
    row.push("nsfw", CellValue::Bool(true));
    row.push("auto_delete_hours", CellValue::Number(48.0));

    let draft = validator().project(&row, 0, now()).expect("typed cells are valid");
    assert!(draft.is_nsfw);
    assert_eq!(draft.auto_delete_after_hours, Some(48.0));
}

#[test]
fn test_unapproved_flair_rejected_per_destination() {
    let row = RawRow::new()
        .with("title", "Look at this")
        .with("subreddit", "programming")
        .with("flair", "Random");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["This flair is not allowed in r/programming"]);
}

#[test]
fn test_uppercase_prefix_does_not_bypass_flair_policy() {
    let row = RawRow::new()
        .with("title", "Sneaky")
        .with("subreddit", "R/programming")
        .with("flair", "Random");

    let outcome = validator().validate_at(&row, 0, now());
    assert!(!outcome.valid);
    assert_eq!(outcome.errors, vec!["This flair is not allowed in r/programming"]);
}

#[test]
fn test_case_variant_destinations_checked_once() {
    let row = RawRow::new()
        .with("title", "Twice")
        .with("subreddit", "programming, Programming")
        .with("flair", "Random");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["This flair is not allowed in r/programming"]);

    let listed = RawRow::new()
        .with("title", "Twice")
        .with("subreddit", "programming, Programming")
        .with("flair", "Help");
    let draft = validator().project(&listed, 0, now()).expect("approved flair passes");
    assert_eq!(draft.destinations, vec!["programming"]);
    assert_eq!(draft.flairs.len(), 1);
}

#[test]
fn test_flair_checked_for_each_destination() {
    let row = RawRow::new()
        .with("title", "Cross post")
        .with("subreddit", "programming, reactjs, webdev")
        .with("flair", "Project");

    let outcome = validator().validate_at(&row, 0, now());
    assert_eq!(outcome.errors, vec!["This flair is not allowed in r/reactjs"]);
}

#[test]
fn test_approved_flair_resolves_to_entry() {
    let row = RawRow::new()
        .with("title", "Need a hand")
        .with("subreddit", "programming")
        .with("flair", "Help");

    let draft = validator().project(&row, 0, now()).expect("approved flair passes");
    let flair = draft.flair_for("programming").expect("flair resolved");
    assert_eq!(flair.id.as_deref(), Some("2"));
    assert_eq!(flair.background_color, "#fee2e2");
}

#[test]
fn test_missing_flair_only_checked_in_strict_mode() {
    let row = RawRow::new().with("title", "No flair").with("subreddit", "programming");

    assert!(validator().validate_at(&row, 0, now()).valid);

    let strict = RowValidator::new(
        FlairPolicyEngine::new(FlairPolicyTable::builtin()).unwrap(),
        ValidationConfig {
            require_flair_for_policies: true,
        },
    );
    let outcome = strict.validate_at(&row, 0, now());
    assert_eq!(
        outcome.errors,
        vec!["r/programming requires a post flair from the approved list"]
    );
}

#[test]
fn test_outcomes_stay_aligned_with_rows() {
    let rows = vec![
        valid_row(),
        RawRow::new().with("title", "").with("subreddit", "rust"),
        valid_row(),
    ];

    let verdicts = validator().project_all(&rows, now());
    assert_eq!(verdicts.len(), rows.len());
    assert!(verdicts[0].is_ok());
    let rejection = verdicts[1].as_ref().expect_err("row 2 is invalid");
    assert_eq!(rejection.row_index, 1);
    assert_eq!(rejection.errors, vec!["Title is required"]);
    assert!(verdicts[2].is_ok());
}

#[test]
fn test_destination_aliases_and_normalisation() {
    assert_eq!(
        parse_destinations(" r/rust, programming ,, rust ,/r/webdev"),
        vec!["rust", "programming", "webdev"]
    );
    assert_eq!(parse_destinations("R/programming"), vec!["programming"]);
    assert_eq!(parse_destinations("/R/WebDev"), vec!["WebDev"]);
    assert_eq!(
        parse_destinations("programming, Programming, PROGRAMMING"),
        vec!["programming"],
        "repeats differing only in case collapse to the first spelling"
    );

    let row = RawRow::new().with("title", "Alias").with("destinations", "rust");
    let draft = validator().project(&row, 0, now()).expect("alias accepted");
    assert_eq!(draft.destinations, vec!["rust"]);

    let row = RawRow::new().with("title", "Alias").with("subreddit(s)", "rust, webdev");
    let draft = validator().project(&row, 0, now()).expect("subreddit(s) header accepted");
    assert_eq!(draft.destinations, vec!["rust", "webdev"]);
}

#[test]
fn test_accepted_time_formats() {
    let expected = Utc.with_ymd_and_hms(2031, 2, 3, 4, 5, 0).unwrap();
    for raw in [
        "2031-02-03 04:05",
        "2031-02-03 04:05:00",
        "2031-02-03T04:05",
        "2031-02-03T04:05:00Z",
        "2031-02-03T06:05:00+02:00",
        "2031/02/03 04:05",
    ] {
        assert_eq!(parse_scheduled_time(raw), Some(expected), "format {raw}");
    }
    assert_eq!(
        parse_scheduled_time("2031-02-03"),
        Some(Utc.with_ymd_and_hms(2031, 2, 3, 0, 0, 0).unwrap())
    );
    assert_eq!(parse_scheduled_time("YYYY-MM-DD HH:mm"), None);
    assert_eq!(parse_scheduled_time("2031-02-30 10:00"), None);
}
