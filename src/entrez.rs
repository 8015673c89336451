use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use crate::config::EntrezCredentials;
use crate::error::AtlasError;
use crate::throttle::Throttle;

/// The biosample attributes the enrichers care about; the rest of the
/// record is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiosampleAttributes {
    pub lat_lon: Option<String>,
    pub geo_loc_name: Option<String>,
    pub isolation_source: Option<String>,
    pub environmental_sample: Option<String>,
}

// `Ok(None)` means the identifier did not resolve; transport failures are
// `Err`.
pub trait EntrezClient: Send + Sync {
    fn fetch_lineage(&self, tax_id: u32) -> Result<Option<String>, AtlasError>;

    fn fetch_biosample(
        &self,
        accession: &str,
    ) -> Result<Option<BiosampleAttributes>, AtlasError>;
}

#[derive(Debug)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    credentials: EntrezCredentials,
    throttle: Throttle,
}

impl EntrezHttpClient {
    pub fn new(credentials: EntrezCredentials, min_delay: Duration) -> Result<Self, AtlasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("asm-atlas/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AtlasError::EntrezHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AtlasError::EntrezHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            credentials,
            throttle: Throttle::new(min_delay),
        })
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("tool", "asm-atlas".to_string()),
            ("email", self.credentials.email.clone()),
        ];
        if let Some(api_key) = &self.credentials.api_key {
            params.push(("api_key", api_key.clone()));
        }
        params
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
                    return Err(AtlasError::EntrezHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AtlasError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "entrez request failed".to_string());
        Err(AtlasError::EntrezStatus { status, message })
    }

    fn biosample_uid(&self, accession: &str) -> Result<Option<String>, AtlasError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let term = format!("{accession}[Accession]");
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .query(&self.common_params())
                .query(&[("db", "biosample"), ("term", &term), ("retmode", "json")])
        })?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| AtlasError::EntrezHttp(err.to_string()))?;
        let uid = body
            .get("esearchresult")
            .and_then(|v| v.get("idlist"))
            .and_then(|v| v.as_array())
            .and_then(|ids| ids.first())
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        Ok(uid)
    }
}

impl EntrezClient for EntrezHttpClient {
    fn fetch_lineage(&self, tax_id: u32) -> Result<Option<String>, AtlasError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let id = tax_id.to_string();
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .query(&self.common_params())
                .query(&[("db", "taxonomy"), ("id", &id), ("retmode", "xml")])
        })?;
        let response = Self::handle_status(response)?;
        let xml = response
            .text()
            .map_err(|err| AtlasError::EntrezHttp(err.to_string()))?;
        parse_taxon_lineage(&xml)
    }

    fn fetch_biosample(
        &self,
        accession: &str,
    ) -> Result<Option<BiosampleAttributes>, AtlasError> {
        let Some(uid) = self.biosample_uid(accession)? else {
            return Ok(None);
        };
        let url = format!("{}/efetch.fcgi", self.base_url);
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .query(&self.common_params())
                .query(&[("db", "biosample"), ("id", &uid)])
        })?;
        let response = Self::handle_status(response)?;
        let xml = response
            .text()
            .map_err(|err| AtlasError::EntrezHttp(err.to_string()))?;
        parse_biosample_attributes(&xml).map(Some)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "BioSampleSet")]
struct BioSampleSetXml {
    #[serde(rename = "BioSample", default)]
    samples: Vec<BioSampleXml>,
}

#[derive(Debug, Deserialize)]
struct BioSampleXml {
    #[serde(rename = "Attributes")]
    attributes: Option<BioSampleAttributesXml>,
}

#[derive(Debug, Deserialize)]
struct BioSampleAttributesXml {
    #[serde(rename = "Attribute", default)]
    attributes: Vec<BioSampleAttributeXml>,
}

#[derive(Debug, Deserialize)]
struct BioSampleAttributeXml {
    #[serde(rename = "@attribute_name")]
    attribute_name: Option<String>,
    #[serde(rename = "@harmonized_name")]
    harmonized_name: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

// Harmonized attribute names win over submitter-chosen ones; the first
// occurrence of each attribute wins.
pub fn parse_biosample_attributes(xml: &str) -> Result<BiosampleAttributes, AtlasError> {
    let parsed: BioSampleSetXml = quick_xml::de::from_str(xml)
        .map_err(|err| AtlasError::EntrezHttp(format!("malformed biosample xml: {err}")))?;

    let mut attributes = BiosampleAttributes::default();
    for sample in &parsed.samples {
        let Some(container) = &sample.attributes else {
            continue;
        };
        for attribute in &container.attributes {
            let Some(key) = attribute
                .harmonized_name
                .as_deref()
                .or(attribute.attribute_name.as_deref())
            else {
                continue;
            };
            let Some(value) = attribute.value.as_deref().map(str::trim) else {
                continue;
            };
            store_attribute(&mut attributes, &key.to_lowercase(), value);
        }
    }
    Ok(attributes)
}

fn store_attribute(attributes: &mut BiosampleAttributes, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let slot = match key {
        "lat_lon" => &mut attributes.lat_lon,
        "geo_loc_name" => &mut attributes.geo_loc_name,
        "isolation_source" => &mut attributes.isolation_source,
        "environmental_sample" => &mut attributes.environmental_sample,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "TaxaSet")]
struct TaxaSetXml {
    #[serde(rename = "Taxon", default)]
    taxa: Vec<TaxonXml>,
}

// <LineageEx> nests further <Taxon> elements; only the top-level record's
// fields matter here, and unknown children are ignored.
#[derive(Debug, Deserialize)]
struct TaxonXml {
    #[serde(rename = "ScientificName")]
    scientific_name: Option<String>,
    #[serde(rename = "Lineage")]
    lineage: Option<String>,
}

// `<Lineage>` covers the ancestors only; the taxon's own scientific name is
// appended so the stored string spans the full path.
pub fn parse_taxon_lineage(xml: &str) -> Result<Option<String>, AtlasError> {
    let parsed: TaxaSetXml = quick_xml::de::from_str(xml)
        .map_err(|err| AtlasError::EntrezHttp(format!("malformed taxonomy xml: {err}")))?;

    let Some(taxon) = parsed.taxa.first() else {
        return Ok(None);
    };
    let name = taxon
        .scientific_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let lineage = taxon
        .lineage
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    Ok(match (lineage, name) {
        (Some(lineage), Some(name)) => Some(format!("{lineage}; {name}")),
        (Some(lineage), None) => Some(lineage.to_string()),
        (None, Some(name)) => Some(name.to_string()),
        (None, None) => None,
    })
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
