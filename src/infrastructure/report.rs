// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use tracing::info;

use crate::domain::models::batch::BuildReport;
use crate::infrastructure::json_file::{write_json_atomic, DataFileError};

/// 写出构建报告
pub async fn write_report(
    path: impl AsRef<Path>,
    report: &BuildReport,
) -> Result<(), DataFileError> {
    let path = path.as_ref();
    write_json_atomic(path, report).await?;
    info!(
        path = %path.display(),
        websites = report.totals.websites,
        screenshots = report.totals.screenshots,
        logos = report.totals.logos,
        favicons = report.totals.favicons,
        "Build report written"
    );
    Ok(())
}
