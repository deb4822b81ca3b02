//! CSV export command

use anyhow::{Context, Result};
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{print_info, print_success, print_warning};

/// Download the session history as CSV
pub async fn export_csv(client: &ApiClient, output: Option<String>) -> Result<()> {
    let Some(csv) = client.get_text("api/export.csv").await? else {
        print_warning("No data to export");
        return Ok(());
    };

    match output {
        Some(path) => {
            let rows = write_csv(Path::new(&path), &csv)?;
            print_success(&format!("Exported {} readings to {}", rows, path));
        }
        None => {
            println!("{}", csv);
            print_info("Use --output <file> to save to a file");
        }
    }

    Ok(())
}

/// Write an export to disk, returning the number of data rows
pub fn write_csv(path: &Path, csv: &str) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    std::fs::write(path, csv)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(csv.lines().count().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("energy_data.csv");
        let csv = "Time,Device_ID,Voltage,Current,Power,Is_Anomaly\n\
                   3:04:05 PM,ESP32_01,220,0.5,110,false\n\
                   3:04:07 PM,ESP32_01,220,1.5,330,true";

        let rows = write_csv(&path, csv).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);
    }

    #[tokio::test]
    async fn test_export_writes_downloaded_file() {
        let mut server = mockito::Server::new_async().await;
        let csv = "Time,Device_ID,Voltage,Current,Power,Is_Anomaly\n3:04:05 PM,ESP32_01,220,0.5,110,false";
        server
            .mock("GET", "/api/export.csv")
            .with_status(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_body(csv)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let client = ApiClient::new(&server.url()).unwrap();

        export_csv(&client, Some(path.to_string_lossy().into_owned()))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);
    }

    #[tokio::test]
    async fn test_export_without_data_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/export.csv")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let client = ApiClient::new(&server.url()).unwrap();

        export_csv(&client, Some(path.to_string_lossy().into_owned()))
            .await
            .unwrap();

        assert!(!path.exists());
    }
}
