use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::AssemblyAccession;
use crate::error::AtlasError;
use crate::record::UNKNOWN;
use crate::throttle::Throttle;

/// Base identity of one assembly. Fields the catalog omits arrive already
/// normalized to the placeholder.
#[derive(Debug, Clone)]
pub struct AssemblySummary {
    pub organism_name: String,
    pub organism_common_name: String,
    pub organism_tax_id: String,
    pub assembly_level: String,
    pub bioproject_accession: String,
    pub biosample_accession: String,
    pub gc_percent: String,
    pub total_sequence_length: String,
    pub sequencing_technology: String,
    pub release_date: String,
    pub collection_date: String,
    pub biosample_description: String,
}

pub trait CatalogClient: Send + Sync {
    fn assembly_summary(
        &self,
        accession: &AssemblyAccession,
    ) -> Result<AssemblySummary, AtlasError>;
}

#[derive(Debug)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl CatalogHttpClient {
    pub fn new(api_key: Option<&str>, min_delay: Duration) -> Result<Self, AtlasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("asm-atlas/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AtlasError::CatalogHttp(err.to_string()))?,
        );
        headers.insert("X-Datasets-Client", HeaderValue::from_static("asm-atlas"));
        headers.insert(
            "X-Datasets-Client-Version",
            HeaderValue::from_str(env!("CARGO_PKG_VERSION"))
                .map_err(|err| AtlasError::CatalogHttp(err.to_string()))?,
        );

        if let Some(api_key) = api_key {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| AtlasError::CatalogHttp(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AtlasError::CatalogHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.ncbi.nlm.nih.gov/datasets/v2".to_string(),
            throttle: Throttle::new(min_delay),
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, AtlasError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            self.throttle.wait();
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(AtlasError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl CatalogClient for CatalogHttpClient {
    fn assembly_summary(
        &self,
        accession: &AssemblyAccession,
    ) -> Result<AssemblySummary, AtlasError> {
        let url = format!(
            "{}/genome/accession/{}/dataset_report",
            self.base_url,
            accession.as_str()
        );
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(AtlasError::CatalogStatus { status, message });
        }
        let report: Value = response
            .json()
            .map_err(|err| AtlasError::CatalogHttp(err.to_string()))?;
        extract_summary(accession, &report)
    }
}

pub fn extract_summary(
    accession: &AssemblyAccession,
    report: &Value,
) -> Result<AssemblySummary, AtlasError> {
    let entry = report
        .get("reports")
        .and_then(|v| v.as_array())
        .and_then(|reports| reports.first())
        .ok_or_else(|| AtlasError::MalformedReport {
            accession: accession.to_string(),
            message: "no reports in dataset report".to_string(),
        })?;

    let organism = entry.get("organism");
    let assembly_info = entry.get("assembly_info");
    let assembly_stats = entry.get("assembly_stats");
    let biosample = assembly_info.and_then(|v| v.get("biosample"));

    let biosample_description = {
        let titled = string_field(biosample, &["description", "title"]);
        if titled == UNKNOWN {
            string_field(biosample, &["title"])
        } else {
            titled
        }
    };

    Ok(AssemblySummary {
        organism_name: string_field(organism, &["organism_name"]),
        organism_common_name: string_field(organism, &["common_name"]),
        organism_tax_id: number_field(organism, &["tax_id"]),
        assembly_level: string_field(assembly_info, &["assembly_level"]),
        bioproject_accession: string_field(assembly_info, &["bioproject_accession"]),
        biosample_accession: string_field(biosample, &["accession"]),
        gc_percent: number_field(assembly_stats, &["gc_percent"]),
        total_sequence_length: string_field(assembly_stats, &["total_sequence_length"]),
        sequencing_technology: string_field(assembly_info, &["sequencing_tech"]),
        release_date: string_field(assembly_info, &["release_date"]),
        collection_date: string_field(biosample, &["collection_date"]),
        biosample_description,
    })
}

fn string_field(root: Option<&Value>, path: &[&str]) -> String {
    let mut cursor = root;
    for key in path {
        cursor = cursor.and_then(|v| v.get(key));
    }
    cursor
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn number_field(root: Option<&Value>, path: &[&str]) -> String {
    let mut cursor = root;
    for key in path {
        cursor = cursor.and_then(|v| v.get(key));
    }
    match cursor {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
