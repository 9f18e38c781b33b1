//! Search 工具：arXiv 论文检索
//!
//! 调用 arXiv Atom API（search_query=all:<query>，按相关度排序），逐条提取标题、作者、PDF 链接与摘要；
//! 请求带超时，摘要截断到 500 字符。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use crate::tools::Tool;

const SUMMARY_MAX_CHARS: usize = 500;

/// 单篇论文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub url: String,
    pub summary: String,
}

impl Paper {
    fn render(&self) -> String {
        let summary: String = self.summary.chars().take(SUMMARY_MAX_CHARS).collect();
        format!(
            "Title: {}\nAuthors: {}\nURL: {}\nSummary: {}...",
            self.title,
            self.authors.join(", "),
            self.url,
            summary
        )
    }
}

struct AtomPatterns {
    entry: Regex,
    title: Regex,
    author: Regex,
    summary: Regex,
    pdf_link: Regex,
    id: Regex,
}

fn patterns() -> &'static AtomPatterns {
    static PATTERNS: OnceLock<AtomPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| AtomPatterns {
        entry: Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"),
        title: Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("valid regex"),
        author: Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid regex"),
        summary: Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").expect("valid regex"),
        pdf_link: Regex::new(r#"<link[^>]*title="pdf"[^>]*href="([^"]+)"|<link[^>]*href="([^"]+)"[^>]*title="pdf""#)
            .expect("valid regex"),
        id: Regex::new(r"(?s)<id>(.*?)</id>").expect("valid regex"),
    })
}

/// 折叠空白并还原常见 XML 实体
fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// 从 arXiv Atom 响应中提取论文列表（feed 自身的 title/id 不计入）
pub fn parse_atom_entries(xml: &str) -> Vec<Paper> {
    let p = patterns();
    p.entry
        .captures_iter(xml)
        .filter_map(|cap| {
            let body = cap.get(1)?.as_str();
            let title = clean_text(p.title.captures(body)?.get(1)?.as_str());
            let authors = p
                .author
                .captures_iter(body)
                .filter_map(|a| a.get(1).map(|m| clean_text(m.as_str())))
                .collect();
            let summary = p
                .summary
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default();
            let url = p
                .pdf_link
                .captures(body)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .or_else(|| p.id.captures(body).and_then(|c| c.get(1)))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default();
            Some(Paper {
                title,
                authors,
                url,
                summary,
            })
        })
        .collect()
}

/// arXiv 检索工具
pub struct SearchTool {
    client: Client,
    base_url: String,
    max_results: usize,
}

impl SearchTool {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64, max_results: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("hpc-assistant/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            max_results: max_results.max(1),
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, String> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
                ("sortBy", "relevance".to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        Ok(parse_atom_entries(&body))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search arXiv for academic papers. Args: {\"query\": \"...\", \"max_results\": 3}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "max_results": { "type": "integer", "minimum": 1 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n.max(1) as usize)
            .unwrap_or(self.max_results);

        tracing::info!(query = %query, max_results, "arxiv search");
        let papers = self.search(query, max_results).await?;
        if papers.is_empty() {
            return Ok("No results found.".to_string());
        }
        Ok(papers
            .iter()
            .map(Paper::render)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:graph</title>
  <id>http://arxiv.org/api/feed</id>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <title>Fast Shortest Paths
      on Sparse Graphs</title>
    <summary>  We study &amp; improve
      shortest path algorithms.  </summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <author>
      <name>Alan Turing</name>
    </author>
    <link href="http://arxiv.org/abs/2101.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2101.00001v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2101.00002v1</id>
    <title>Graph Coloring</title>
    <summary>Heuristics.</summary>
    <author><name>Grace Hopper</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_entries() {
        let papers = parse_atom_entries(FEED);
        assert_eq!(papers.len(), 2);

        assert_eq!(papers[0].title, "Fast Shortest Paths on Sparse Graphs");
        assert_eq!(papers[0].authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(papers[0].url, "http://arxiv.org/pdf/2101.00001v1");
        assert_eq!(papers[0].summary, "We study & improve shortest path algorithms.");

        // 无 pdf 链接时回退到 <id>
        assert_eq!(papers[1].url, "http://arxiv.org/abs/2101.00002v1");
    }

    #[test]
    fn test_render_truncates_summary() {
        let paper = Paper {
            title: "T".into(),
            authors: vec!["A".into(), "B".into()],
            url: "u".into(),
            summary: "s".repeat(800),
        };
        let text = paper.render();
        assert!(text.starts_with("Title: T\nAuthors: A, B\nURL: u\nSummary: "));
        assert!(text.ends_with("..."));
        assert!(text.len() < 600);
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = SearchTool::new("http://127.0.0.1:9/api/query", 1, 3);
        let err = tool.execute(serde_json::json!({"query": "  "})).await.unwrap_err();
        assert_eq!(err, "Missing query");
    }
}
