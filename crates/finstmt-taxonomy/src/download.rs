use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, warn};

use finstmt_core::error::{AppError, AppResult};

/// Default location of the pre-extracted linkbase JSON archives
const DEFAULT_BASE_URL: &str = "https://taxonomies.finstmt.dev/linkbases";

/// Map the accounting standards present in a corpus to the taxonomy
/// packages the pipeline needs. US-GAAP corpora need both recent US-GAAP
/// years; IFRS corpora additionally need ESEF, which extends IFRS.
pub fn needed_taxonomies(accounting_standards: &[String]) -> BTreeSet<String> {
    let mut needed = BTreeSet::new();
    for standard in accounting_standards {
        let upper = standard.to_uppercase();
        if upper.contains("IFRS") {
            needed.insert("ifrs-2023".to_string());
            needed.insert("ifrs-2024".to_string());
            needed.insert("esef-2024".to_string());
        } else {
            needed.insert("us-gaap-2023".to_string());
            needed.insert("us-gaap-2024".to_string());
        }
    }
    needed
}

/// Which of the needed taxonomies have no calc file on disk yet
pub fn missing_taxonomies(taxonomy_dir: &Path, needed: &BTreeSet<String>) -> Vec<String> {
    needed
        .iter()
        .filter(|name| !taxonomy_dir.join(format!("{}-calc.json", name)).exists())
        .cloned()
        .collect()
}

/// Download the calc and labels linkbase files for every missing
/// taxonomy. Failures are WARNINGs: the hierarchy populator degrades to
/// pattern matching for taxonomies it cannot load.
pub async fn download_missing(
    taxonomy_dir: &Path,
    accounting_standards: &[String],
) -> AppResult<usize> {
    let needed = needed_taxonomies(accounting_standards);
    let missing = missing_taxonomies(taxonomy_dir, &needed);

    if missing.is_empty() {
        info!("All needed taxonomies already downloaded");
        return Ok(0);
    }

    std::fs::create_dir_all(taxonomy_dir)?;

    let base_url =
        std::env::var("TAXONOMY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let client = reqwest::Client::builder()
        .user_agent("finstmt-pipeline")
        .build()
        .map_err(|e| AppError::ExternalApiError(format!("HTTP client: {}", e)))?;

    let mut downloaded = 0usize;
    for name in &missing {
        info!("Downloading taxonomy linkbases for '{}'", name);
        for kind in ["calc", "labels"] {
            let file_name = format!("{}-{}.json", name, kind);
            let url = format!("{}/{}", base_url, file_name);
            match fetch_file(&client, &url).await {
                Ok(body) => {
                    std::fs::write(taxonomy_dir.join(&file_name), body)?;
                    downloaded += 1;
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", url, e);
                }
            }
        }
    }

    Ok(downloaded)
}

async fn fetch_file(client: &reqwest::Client, url: &str) -> AppResult<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::ExternalApiError(format!(
            "{}: HTTP {}",
            url,
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifrs_corpus_needs_esef_too() {
        // REQUIREMENT: ESEF extends IFRS, so IFRS corpora need both
        // PURPOSE: Verify the standard-to-taxonomy mapping for IFRS filers
        let needed = needed_taxonomies(&["IFRS".to_string()]);
        assert!(needed.contains("ifrs-2023"));
        assert!(needed.contains("ifrs-2024"));
        assert!(needed.contains("esef-2024"));
        assert!(!needed.contains("us-gaap-2024"));
    }

    #[test]
    fn mixed_corpus_needs_both_families() {
        // REQUIREMENT: Mixed corpora load every framework they use
        // PURPOSE: Verify US-GAAP and IFRS standards union their taxonomies
        let needed = needed_taxonomies(&["US-GAAP".to_string(), "IFRS".to_string()]);
        assert!(needed.contains("us-gaap-2023"));
        assert!(needed.contains("esef-2024"));
    }

    #[test]
    fn missing_detection_checks_calc_files() {
        // REQUIREMENT: Only absent taxonomies are downloaded
        // PURPOSE: Verify missing detection keys off the calc files on disk
        let needed = needed_taxonomies(&["US-GAAP".to_string()]);
        let missing = missing_taxonomies(Path::new("/nonexistent"), &needed);
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn download_skips_when_all_taxonomies_present() {
        // REQUIREMENT: A fully-populated taxonomy directory needs no network
        // PURPOSE: Verify download_missing is a no-op when every needed
        // calc file already exists
        let dir = std::env::temp_dir().join(format!("finstmt-taxonomies-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["us-gaap-2023", "us-gaap-2024"] {
            std::fs::write(dir.join(format!("{}-calc.json", name)), "{}").unwrap();
        }

        let downloaded =
            tokio_test::block_on(download_missing(&dir, &["US-GAAP".to_string()])).unwrap();
        assert_eq!(downloaded, 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
