//! Ordered per-field extraction rules.
//!
//! Every field follows the same shape: prefer a structured field the feed
//! provided, else match a pattern against the free-text description, else
//! fall back to a fixed default. `job_type` consults the feed URL before the
//! description, and `category` is derived from the feed URL alone.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::JobRecord;

/// A loosely structured feed item after XML decoding, before extraction.
///
/// `company` and `location` carry the feed's structured `job:` namespace
/// fields when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<String>,
    pub guid: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

static COMPANY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Company|Employer):\s*([^<\n]+)").unwrap());
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Location|Based in):\s*([^<\n]+)").unwrap());
static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Type:\s*([^<\n]+)").unwrap());
static SALARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$[\d,]+(?:\s*-\s*\$[\d,]+)?k?").unwrap());
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"job_categories=([^&]+)").unwrap());

/// Turns one raw feed item into a normalized record.
///
/// Returns `None` for items with neither a title nor a link: there is
/// nothing to key or display, so the item is skipped (and not counted as
/// fetched). All other gaps fall back per the rule table.
pub fn extract_record(item: &RawItem, feed_url: &str) -> Option<JobRecord> {
    let title = item.title.as_deref().unwrap_or("").trim();
    let link = item.link.as_deref().unwrap_or("").trim();
    if title.is_empty() && link.is_empty() {
        tracing::warn!(feed = %feed_url, "skipping malformed feed item without title or link");
        return None;
    }

    let description = item.description.as_deref().unwrap_or("").trim();
    let company = extract_company(item, description);
    let location = extract_location(item, description);
    let job_type = extract_job_type(feed_url, description);
    let category = extract_category(feed_url);
    let salary = extract_salary(description);
    let published_at = item
        .pub_date
        .as_deref()
        .and_then(parse_pub_date)
        .unwrap_or_else(Utc::now);
    let external_id = item
        .guid
        .as_deref()
        .map(str::trim)
        .filter(|guid| !guid.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| synthesize_external_id(title, &company, link));

    Some(JobRecord {
        title: title.to_string(),
        company,
        location,
        description: description.to_string(),
        job_type,
        category,
        salary,
        published_at,
        external_id,
        source_url: link.to_string(),
        source_feed: feed_url.to_string(),
    })
}

fn extract_company(item: &RawItem, description: &str) -> String {
    if let Some(company) = structured(&item.company) {
        return company;
    }
    COMPANY_RE
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn extract_location(item: &RawItem, description: &str) -> String {
    if let Some(location) = structured(&item.location) {
        return location;
    }
    LOCATION_RE
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "Remote".to_string())
}

fn extract_job_type(feed_url: &str, description: &str) -> String {
    for known in ["full-time", "part-time", "contract"] {
        if feed_url.contains(known) {
            return known.to_string();
        }
    }
    TYPE_RE
        .captures(description)
        .map(|caps| caps[1].trim().to_lowercase())
        .unwrap_or_else(|| "full-time".to_string())
}

fn extract_category(feed_url: &str) -> String {
    CATEGORY_RE
        .captures(feed_url)
        .map(|caps| caps[1].replace('-', " "))
        .unwrap_or_else(|| "general".to_string())
}

fn extract_salary(description: &str) -> Option<String> {
    SALARY_RE
        .find(description)
        .map(|salary| salary.as_str().to_string())
}

fn structured(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Deterministic fixed-length identifier for items without a feed guid.
///
/// The same title/company/link always maps to the same id, so repeated
/// extraction of one logical posting converges on one stored record.
pub fn synthesize_external_id(title: &str, company: &str, link: &str) -> String {
    let digest = Sha256::digest(format!("{title}-{company}-{link}").as_bytes());
    digest
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
