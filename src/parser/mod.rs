pub mod details;
pub mod level;

use crate::store::{LessonRow, ProcessedRow};

/// Offline pass over scraped rows: split the level out of each details blob.
pub fn process_rows(rows: Vec<LessonRow>) -> Vec<ProcessedRow> {
    rows.into_iter()
        .map(|row| {
            let (level, details) = level::split_level(&row.details);
            ProcessedRow {
                id: row.id,
                title: row.title,
                details,
                url: row.url,
                level,
            }
        })
        .collect()
}
