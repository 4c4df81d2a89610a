//! Web search client for company research
//!
//! Combines Google Programmable Search, SerpAPI and the Wikipedia summary
//! endpoint into one formatted context block for the AI prompts. Provider
//! failures are tolerated; whatever was found is returned.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::AppResult;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const WIKI_TIMEOUT: Duration = Duration::from_secs(5);

/// Web search client
#[derive(Clone)]
pub struct WebSearchClient {
    client: Client,
    google_pse_api_key: String,
    google_pse_cx: String,
    serpapi_api_key: String,
}

/// A single search hit, normalized across providers
#[derive(Debug, Clone)]
struct SearchHit {
    title: String,
    snippet: String,
    link: String,
    source: &'static str,
}

#[derive(Debug, Deserialize)]
struct PseResponse {
    #[serde(default)]
    items: Vec<PseItem>,
}

#[derive(Debug, Deserialize)]
struct PseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct WikiSummary {
    title: Option<String>,
    extract: Option<String>,
}

impl WebSearchClient {
    /// Create a client from configuration
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: Client::new(),
            google_pse_api_key: config.google_pse_api_key.clone(),
            google_pse_cx: config.google_pse_cx.clone(),
            serpapi_api_key: config.serpapi_api_key.clone(),
        }
    }

    /// Search the web for company information and format the results as a
    /// text block usable in an AI prompt
    pub async fn search_company(&self, company_name: &str) -> AppResult<String> {
        let query = format!("{} company information business profile", company_name);
        let mut hits: Vec<SearchHit> = Vec::new();

        if let Err(e) = self.google_pse_search(&query, &mut hits).await {
            tracing::warn!("Google PSE search failed: {}", e);
        }
        if let Err(e) = self.serpapi_search(&query, &mut hits).await {
            tracing::warn!("SerpAPI search failed: {}", e);
        }
        if let Err(e) = self.wikipedia_summary(company_name, &mut hits).await {
            tracing::debug!("Wikipedia lookup failed: {}", e);
        }

        // Deduplicate by URL
        let mut seen = HashSet::new();
        hits.retain(|h| seen.insert(h.link.clone()));

        let mut context = String::new();
        for hit in &hits {
            context.push_str(&format!(
                "\nTitle: {}\nSnippet: {}\nLink: {}\nSource: {}\n---\n",
                hit.title, hit.snippet, hit.link, hit.source
            ));
        }
        Ok(context)
    }

    async fn google_pse_search(&self, query: &str, hits: &mut Vec<SearchHit>) -> AppResult<()> {
        if self.google_pse_api_key.is_empty() || self.google_pse_cx.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", self.google_pse_api_key.as_str()),
                ("cx", self.google_pse_cx.as_str()),
                ("q", query),
                ("num", "5"),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(());
        }

        let data: PseResponse = response
            .json()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        for item in data.items {
            hits.push(SearchHit {
                title: item.title,
                snippet: item.snippet,
                link: item.link,
                source: "Google PSE",
            });
        }
        Ok(())
    }

    async fn serpapi_search(&self, query: &str, hits: &mut Vec<SearchHit>) -> AppResult<()> {
        if self.serpapi_api_key.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .get("https://serpapi.com/search")
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.serpapi_api_key.as_str()),
                ("num", "5"),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(());
        }

        let data: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        for item in data.organic_results {
            hits.push(SearchHit {
                title: item.title,
                snippet: item.snippet,
                link: item.link,
                source: "SerpAPI",
            });
        }
        Ok(())
    }

    /// Force-include the company's Wikipedia page when one exists
    async fn wikipedia_summary(&self, company_name: &str, hits: &mut Vec<SearchHit>) -> AppResult<()> {
        let page = company_name.replace(' ', "_");
        let url = format!("https://en.wikipedia.org/api/rest_v1/page/summary/{}", page);

        let response = self
            .client
            .get(&url)
            .timeout(WIKI_TIMEOUT)
            .send()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(());
        }

        let summary: WikiSummary = response
            .json()
            .await
            .map_err(|e| crate::error::AppError::ExternalService(e.to_string()))?;

        if let Some(extract) = summary.extract {
            hits.push(SearchHit {
                title: format!(
                    "Wikipedia: {}",
                    summary.title.unwrap_or_else(|| company_name.to_string())
                ),
                snippet: extract,
                link: format!("https://en.wikipedia.org/wiki/{}", page),
                source: "Wikipedia",
            });
        }
        Ok(())
    }
}
