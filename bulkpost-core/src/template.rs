//! Downloadable example sheet listing every recognised column.

use csv::Writer;

use crate::model::columns;

pub const TEMPLATE_FILE_NAME: &str = "reddit_bulk_upload_template.csv";

/// Column and placeholder pairs, in template column order.
pub fn template_columns() -> [(&'static str, &'static str); 9] {
    [
        (columns::TITLE, "Example Post Title"),
        (columns::CONTENT, "Post content here"),
        (columns::DESTINATION[0], "subreddit_name"),
        (columns::SCHEDULED_TIME[0], "YYYY-MM-DD HH:mm"),
        (columns::FLAIR, "Post Flair"),
        (columns::NSFW, "false"),
        (columns::SPOILER, "false"),
        (columns::AUTO_DELETE_HOURS, "24"),
        (columns::AUTO_DELETE_SCORE, "0"),
    ]
}

/// Renders the one-row template as CSV bytes. Deterministic.
pub fn generate_template() -> Result<Vec<u8>, csv::Error> {
    let (headers, values): (Vec<&str>, Vec<&str>) = template_columns().into_iter().unzip();
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;
    writer.write_record(&values)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
