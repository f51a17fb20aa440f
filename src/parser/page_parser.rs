// Extracts the SEO-relevant facts of an HTML document
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OPEN_GRAPH_REQUIRED: [&str; 3] = ["og:title", "og:description", "og:image"];

/// Facts pulled from one page. Absent tags leave empty strings, zero counts
/// or `None`; parsing never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub meta_description: String,
    pub h1_count: usize,
    pub h2_count: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
    pub responsive_images: usize,
    pub open_graph: Vec<String>,
    pub viewport: Option<String>,
    pub canonical: Option<String>,
    pub schema_types: Vec<String>,
    pub internal_links: usize,
    pub external_links: usize,
    pub empty_anchors: usize,
    pub nofollow_internal: usize,
    pub lang: Option<String>,
    pub charset: Option<String>,
    pub has_doctype: bool,
    /// `http://` sub-resources (scripts, images, frames, stylesheets).
    pub insecure_resources: usize,
    pub size_bytes: usize,
}

impl PageSnapshot {
    /// `page_url` resolves relative links when classifying them as internal.
    pub fn parse(html: &str, page_url: Option<&Url>) -> Self {
        let document = Html::parse_document(html);
        let metas = select(&document, "meta");

        let meta_content = |name: &str| {
            metas
                .iter()
                .find(|m| attr_eq(m, "name", name))
                .and_then(|m| m.value().attr("content"))
                .map(|c| c.trim().to_string())
        };

        let images = select(&document, "img");
        let open_graph = OPEN_GRAPH_REQUIRED
            .iter()
            .filter(|tag| {
                metas.iter().any(|m| {
                    attr_eq(m, "property", tag)
                        && m.value().attr("content").is_some_and(|c| !c.trim().is_empty())
                })
            })
            .map(|tag| tag.to_string())
            .collect();

        let charset = metas
            .iter()
            .find_map(|m| m.value().attr("charset").map(|c| c.trim().to_lowercase()))
            .or_else(|| {
                metas
                    .iter()
                    .filter(|m| attr_eq(m, "http-equiv", "content-type"))
                    .filter_map(|m| m.value().attr("content"))
                    .find_map(|c| {
                        c.to_lowercase()
                            .split("charset=")
                            .nth(1)
                            .map(|s| s.trim().to_string())
                    })
            });

        let links = classify_links(&document, page_url);

        Self {
            title: select(&document, "title")
                .first()
                .map(|t| t.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            meta_description: meta_content("description").unwrap_or_default(),
            h1_count: select(&document, "h1").len(),
            h2_count: select(&document, "h2").len(),
            image_count: images.len(),
            images_missing_alt: images
                .iter()
                .filter(|img| img.value().attr("alt").is_none_or(|a| a.trim().is_empty()))
                .count(),
            responsive_images: images
                .iter()
                .filter(|img| img.value().attr("srcset").is_some() || img.value().attr("sizes").is_some())
                .count(),
            open_graph,
            viewport: meta_content("viewport"),
            canonical: select(&document, "link")
                .iter()
                .find(|l| rel_contains(l, "canonical"))
                .and_then(|l| l.value().attr("href"))
                .map(|h| h.trim().to_string()),
            schema_types: schema_types(&document),
            internal_links: links.internal,
            external_links: links.external,
            empty_anchors: links.empty,
            nofollow_internal: links.nofollow_internal,
            lang: select(&document, "html")
                .first()
                .and_then(|h| h.value().attr("lang"))
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            charset,
            has_doctype: html.trim_start().to_lowercase().starts_with("<!doctype"),
            insecure_resources: insecure_resources(&document),
            size_bytes: html.len(),
        }
    }

    pub fn has_schema(&self, types: &[&str]) -> bool {
        self.schema_types
            .iter()
            .any(|t| types.iter().any(|wanted| t.eq_ignore_ascii_case(wanted)))
    }
}

/// True when robots.txt disallows the whole site.
pub fn robots_blocks_all(robots: &str) -> bool {
    robots.lines().any(|line| {
        let line = line.split('#').next().unwrap_or_default();
        match line.split_once(':') {
            Some((key, value)) => key.trim().eq_ignore_ascii_case("disallow") && value.trim() == "/",
            None => false,
        }
    })
}

pub fn robots_has_sitemap(robots: &str) -> bool {
    robots.lines().any(|line| {
        line.split_once(':')
            .is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case("sitemap"))
    })
}

fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn attr_eq(element: &ElementRef, attr: &str, expected: &str) -> bool {
    element
        .value()
        .attr(attr)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

fn rel_contains(element: &ElementRef, token: &str) -> bool {
    element
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case(token)))
}

#[derive(Default)]
struct LinkCounts {
    internal: usize,
    external: usize,
    empty: usize,
    nofollow_internal: usize,
}

fn classify_links(document: &Html, page_url: Option<&Url>) -> LinkCounts {
    let mut counts = LinkCounts::default();
    let host = page_url.and_then(|u| u.host_str());

    for anchor in select(document, "a") {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || href == "#" || href.to_lowercase().starts_with("javascript:") {
            counts.empty += 1;
            continue;
        }
        if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("tel:") {
            continue;
        }

        let resolved = match page_url {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        let internal = match resolved {
            Some(target) => target.host_str().is_some() && target.host_str() == host,
            // Relative link on a page without a known address.
            None => page_url.is_none(),
        };

        if internal {
            counts.internal += 1;
            if rel_contains(&anchor, "nofollow") {
                counts.nofollow_internal += 1;
            }
        } else {
            counts.external += 1;
        }
    }
    counts
}

fn insecure_resources(document: &Html) -> usize {
    let insecure = |v: &str| v.trim().to_lowercase().starts_with("http://");
    let by_src = ["img", "script", "iframe", "source", "video", "audio"]
        .iter()
        .flat_map(|tag| select(document, tag))
        .filter(|e| e.value().attr("src").is_some_and(insecure))
        .count();
    let stylesheets = select(document, "link")
        .iter()
        .filter(|l| rel_contains(l, "stylesheet"))
        .filter(|l| l.value().attr("href").is_some_and(insecure))
        .count();
    by_src + stylesheets
}

fn schema_types(document: &Html) -> Vec<String> {
    let mut types = Vec::new();

    for script in select(document, "script") {
        if !attr_eq(&script, "type", "application/ld+json") {
            continue;
        }
        let raw: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<Value>(&raw) {
            collect_types(&value, &mut types);
        }
    }

    for element in select(document, "[itemtype]") {
        if let Some(itemtype) = element.value().attr("itemtype") {
            for t in itemtype.split_whitespace() {
                if let Some(name) = t.trim_end_matches('/').rsplit('/').next() {
                    push_unique(&mut types, name);
                }
            }
        }
    }
    types
}

fn collect_types(value: &Value, types: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(t)) => push_unique(types, t),
                Some(Value::Array(items)) => {
                    for t in items.iter().filter_map(Value::as_str) {
                        push_unique(types, t);
                    }
                }
                _ => {}
            }
            for nested in map.values() {
                collect_types(nested, types);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_types(item, types);
            }
        }
        _ => {}
    }
}

fn push_unique(types: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !types.iter().any(|t| t == name) {
        types.push(name.to_string());
    }
}
