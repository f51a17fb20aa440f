// Category audits: each turns the collected site evidence into named checks
// and the category's own recommendation items.
use crate::analyzer::recommendation::sort_by_priority;
use crate::analyzer::scoring::{CheckResult, CheckStatus, category_score};
use crate::analyzer::seo::{PageSpeedMetrics, SeoCategory, SeoCategoryResult};
use crate::config::SeoThresholds;
use crate::model::{Priority, Recommendation};
use crate::parser::PageSnapshot;
use crate::parser::page_parser::{robots_blocks_all, robots_has_sitemap};
use crate::source::FetchedPage;
use crate::utils::percent;
use reqwest::Url;
use serde_json::json;
use std::collections::BTreeMap;

/// Everything gathered about a site before scoring. A `None` fetch means the
/// request failed or timed out.
pub struct SiteEvidence<'a> {
    pub url: &'a Url,
    pub page: Option<&'a FetchedPage>,
    pub page_error: Option<&'a str>,
    pub snapshot: &'a PageSnapshot,
    pub robots: Option<&'a FetchedPage>,
    pub sitemap: Option<&'a FetchedPage>,
    pub speed: Option<&'a PageSpeedMetrics>,
}

type Checks = BTreeMap<String, CheckResult>;

/// Check name, action, suggestions.
type Rule = (&'static str, &'static str, &'static [&'static str]);

pub fn audit(category: SeoCategory, evidence: &SiteEvidence, thresholds: &SeoThresholds) -> SeoCategoryResult {
    let (checks, rules): (Checks, &[Rule]) = match category {
        SeoCategory::Crawlability => (crawlability(evidence), CRAWLABILITY_RULES),
        SeoCategory::PageSpeed => (page_speed(evidence, thresholds), PAGE_SPEED_RULES),
        SeoCategory::MobileOptimization => (mobile(evidence), MOBILE_RULES),
        SeoCategory::MetaTags => (meta_tags(evidence, thresholds), META_TAG_RULES),
        SeoCategory::SchemaMarkup => (schema_markup(evidence), SCHEMA_RULES),
        SeoCategory::InternalLinking => (internal_linking(evidence, thresholds), LINKING_RULES),
        SeoCategory::TechnicalIssues => (technical_issues(evidence, thresholds), TECHNICAL_RULES),
        SeoCategory::Security => (security(evidence), SECURITY_RULES),
    };

    let recommendations = recommend(category, &checks, rules, evidence);
    SeoCategoryResult {
        score: category_score(checks.values()),
        checks,
        recommendations,
    }
}

fn recommend(category: SeoCategory, checks: &Checks, rules: &[Rule], evidence: &SiteEvidence) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = rules
        .iter()
        .filter_map(|(name, action, suggestions)| {
            let check = checks.get(*name)?;
            let priority = match check.status() {
                CheckStatus::Good => return None,
                CheckStatus::Warning => Priority::Medium,
                CheckStatus::Critical => Priority::High,
            };
            let mut rec = Recommendation::new(priority, category.kind(), *action)
                .with_suggestions(suggestions.iter().copied());
            if let Some(metric) = metric_for(name, check, evidence) {
                rec = rec.with_metric(metric);
            }
            Some(rec)
        })
        .collect();
    sort_by_priority(&mut recommendations);
    recommendations
}

fn metric_for(name: &str, check: &CheckResult, evidence: &SiteEvidence) -> Option<String> {
    match (name, check) {
        ("title_tag", _) => Some(format!("Current length: {}", evidence.snapshot.title.chars().count())),
        ("internal_links", _) => Some(format!(
            "{} internal, {} external links",
            evidence.snapshot.internal_links, evidence.snapshot.external_links
        )),
        ("meta_description", _) => Some(format!(
            "Current length: {}",
            evidence.snapshot.meta_description.chars().count()
        )),
        (_, CheckResult::Measured { value, unit, .. }) => Some(format!("{name}: {value} {unit}")),
        (_, CheckResult::Flag { message: Some(m), .. }) => Some(m.clone()),
        _ => None,
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Status for a "larger is better" count.
fn at_least(value: usize, good_from: usize, warning_from: usize) -> CheckStatus {
    if value >= good_from {
        CheckStatus::Good
    } else if value >= warning_from {
        CheckStatus::Warning
    } else {
        CheckStatus::Critical
    }
}

/// 2xx is good, 3xx a warning, anything else critical.
fn status_class(status: u16) -> CheckStatus {
    match status {
        200..=299 => CheckStatus::Good,
        300..=399 => CheckStatus::Warning,
        _ => CheckStatus::Critical,
    }
}

fn none_found(count: usize) -> CheckStatus {
    CheckStatus::present_or(count == 0, CheckStatus::Warning)
}

const CRAWLABILITY_RULES: &[Rule] = &[
    ("robots_txt", "Create robots.txt file", &["Allow crawling of public pages", "Reference the XML sitemap"]),
    ("sitemap_xml", "Generate and submit XML sitemap", &["Submit the sitemap in Search Console"]),
    ("crawl_errors", "Fix page accessibility errors", &["Check server availability", "Return 200 for the canonical URL"]),
    ("redirect_chains", "Remove cross-domain redirects", &["Link directly to the final URL"]),
    ("canonical_tags", "Add canonical tags", &["Declare one canonical URL per page"]),
];

fn crawlability(ev: &SiteEvidence) -> Checks {
    let mut checks = Checks::new();

    let robots = match ev.robots {
        Some(robots) => {
            let blocks_all = robots_blocks_all(&robots.body);
            CheckResult::structured(
                CheckStatus::present_or(!blocks_all, CheckStatus::Warning),
                [
                    ("present", json!(true)),
                    ("allows_crawling", json!(!blocks_all)),
                    ("has_sitemap_directive", json!(robots_has_sitemap(&robots.body))),
                ],
            )
        }
        None => CheckResult::structured(
            CheckStatus::Warning,
            [("present", json!(false)), ("message", json!("robots.txt not found"))],
        ),
    };
    checks.insert("robots_txt".into(), robots);

    checks.insert(
        "sitemap_xml".into(),
        match ev.sitemap {
            Some(_) => CheckResult::flag(true),
            None => CheckResult::flag_with(false, "sitemap.xml not found"),
        },
    );

    checks.insert(
        "crawl_errors".into(),
        match ev.page {
            Some(page) if page.status >= 400 => CheckResult::flag_with(false, format!("status {}", page.status)),
            Some(_) => CheckResult::flag(true),
            None => CheckResult::flag_with(false, ev.page_error.unwrap_or("page unreachable")),
        },
    );

    let redirects = match ev.page {
        Some(page) => {
            let same_host = host_of(&page.final_url) == host_of(&page.requested_url);
            CheckResult::structured(
                CheckStatus::present_or(same_host, CheckStatus::Warning),
                [("final_url", json!(page.final_url)), ("same_host", json!(same_host))],
            )
        }
        None => CheckResult::structured(CheckStatus::Critical, [("final_url", json!(null))]),
    };
    checks.insert("redirect_chains".into(), redirects);

    checks.insert(
        "canonical_tags".into(),
        CheckResult::structured(
            CheckStatus::present_or(ev.snapshot.canonical.is_some(), CheckStatus::Warning),
            [("canonical", json!(ev.snapshot.canonical))],
        ),
    );
    checks
}

const PAGE_SPEED_RULES: &[Rule] = &[
    ("load_time", "Optimize page load time", &["Compress images", "Minify CSS/JS", "Enable caching"]),
    ("first_contentful_paint", "Reduce render-blocking resources", &["Inline critical CSS", "Defer non-critical scripts"]),
    ("largest_contentful_paint", "Speed up the largest contentful element", &["Preload the hero image", "Serve images in modern formats"]),
    ("cumulative_layout_shift", "Stabilize page layout", &["Reserve space for images and embeds", "Avoid inserting content above existing content"]),
];

fn page_speed(ev: &SiteEvidence, t: &SeoThresholds) -> Checks {
    let mut checks = Checks::new();
    let names = ["load_time", "first_contentful_paint", "largest_contentful_paint", "cumulative_layout_shift"];

    let Some(m) = ev.speed else {
        for name in names {
            checks.insert(name.into(), CheckResult::flag_with(false, "measurement unavailable"));
        }
        return checks;
    };

    let measured = [
        (m.load_time_ms as f64, "ms", t.load_time_ms),
        (m.fcp_ms as f64, "ms", t.fcp_ms),
        (m.lcp_ms as f64, "ms", t.lcp_ms),
        (m.cls, "score", t.cls),
    ];
    for (name, (value, unit, band)) in names.into_iter().zip(measured) {
        let status = CheckStatus::banded(value, band.good_below, band.warning_below);
        checks.insert(name.into(), CheckResult::measured(value, unit, status));
    }
    checks
}

const MOBILE_RULES: &[Rule] = &[
    ("mobile_friendly", "Implement responsive design", &["Use fluid layouts", "Test on small viewports"]),
    ("viewport_meta", "Add a device-width viewport meta tag", &["<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"]),
    ("responsive_images", "Serve responsive images", &["Add srcset and sizes to content images"]),
];

fn mobile(ev: &SiteEvidence) -> Checks {
    let mut checks = Checks::new();
    let device_width = ev
        .snapshot
        .viewport
        .as_deref()
        .is_some_and(|v| v.to_lowercase().contains("width=device-width"));

    checks.insert("mobile_friendly".into(), CheckResult::flag(ev.page.is_some() && device_width));

    let viewport_status = match (&ev.snapshot.viewport, device_width) {
        (Some(_), true) => CheckStatus::Good,
        (Some(_), false) => CheckStatus::Warning,
        (None, _) => CheckStatus::Critical,
    };
    checks.insert(
        "viewport_meta".into(),
        CheckResult::structured(viewport_status, [("content", json!(ev.snapshot.viewport))]),
    );

    let images = ev.snapshot.image_count;
    let share = if images == 0 {
        100.0
    } else {
        percent(ev.snapshot.responsive_images as f64, images as f64)
    };
    checks.insert(
        "responsive_images".into(),
        CheckResult::measured(
            share.round(),
            "%",
            CheckStatus::present_or(share >= 50.0, CheckStatus::Warning),
        ),
    );
    checks
}

const META_TAG_RULES: &[Rule] = &[
    ("title_tag", "Optimize title tag length (30-60 characters)", &["Lead with the primary keyword", "Keep titles unique per page"]),
    ("meta_description", "Write a meta description of 120-160 characters", &["Summarize the page value", "Include a call to action"]),
    ("heading_structure", "Use exactly one H1 and structure content with H2s", &["Keep one H1 per page", "Break content into H2 sections"]),
    ("alt_attributes", "Add alt text to images", &["Describe each content image", "Use empty alt only for decorative images"]),
    ("og_tags", "Add Open Graph tags", &["Set og:title, og:description and og:image"]),
];

fn meta_tags(ev: &SiteEvidence, t: &SeoThresholds) -> Checks {
    let mut checks = Checks::new();
    let s = ev.snapshot;

    let length_check = |text: &str, (min, max): (usize, usize)| {
        let length = text.chars().count();
        let optimal = (min..=max).contains(&length);
        CheckResult::structured(
            CheckStatus::present_or(optimal, CheckStatus::Warning),
            [
                ("present", json!(!text.is_empty())),
                ("length", json!(length)),
                ("optimal_length", json!(optimal)),
                ("content", json!(text)),
            ],
        )
    };
    checks.insert("title_tag".into(), length_check(&s.title, t.title_length));
    checks.insert("meta_description".into(), length_check(&s.meta_description, t.description_length));

    let headings_ok = s.h1_count == 1 && s.h2_count > 0;
    checks.insert(
        "heading_structure".into(),
        CheckResult::structured(
            CheckStatus::present_or(headings_ok, CheckStatus::Warning),
            [
                ("h1_count", json!(s.h1_count)),
                ("h2_count", json!(s.h2_count)),
                ("proper_h1_usage", json!(s.h1_count == 1)),
                ("hierarchical_structure", json!(s.h2_count > 0)),
            ],
        ),
    );

    let alt_status = match s.images_missing_alt {
        0 => CheckStatus::Good,
        missing if missing * 2 <= s.image_count => CheckStatus::Warning,
        _ => CheckStatus::Critical,
    };
    checks.insert(
        "alt_attributes".into(),
        CheckResult::measured(s.images_missing_alt as f64, "images", alt_status),
    );

    let og_status = match s.open_graph.len() {
        0 => CheckStatus::Critical,
        n if n >= 3 => CheckStatus::Good,
        _ => CheckStatus::Warning,
    };
    checks.insert(
        "og_tags".into(),
        CheckResult::structured(og_status, [("found", json!(s.open_graph))]),
    );
    checks
}

const SCHEMA_RULES: &[Rule] = &[
    ("structured_data_present", "Implement structured data markup", &["Add JSON-LD for rich snippets in search results"]),
    ("organization_schema", "Add Organization schema", &["Include name, logo and sameAs profiles"]),
    ("breadcrumb_schema", "Add BreadcrumbList schema", &["Mirror the visible breadcrumb trail"]),
    ("product_schema", "Add Product schema", &["Include price, availability and SKU"]),
    ("review_schema", "Add Review or AggregateRating schema", &["Mark up genuine customer ratings"]),
];

fn schema_markup(ev: &SiteEvidence) -> Checks {
    let mut checks = Checks::new();
    let s = ev.snapshot;

    checks.insert(
        "structured_data_present".into(),
        CheckResult::flag(!s.schema_types.is_empty()),
    );

    let typed = [
        ("organization_schema", &["Organization", "Corporation", "LocalBusiness"][..]),
        ("breadcrumb_schema", &["BreadcrumbList"][..]),
        ("product_schema", &["Product"][..]),
        ("review_schema", &["Review", "AggregateRating"][..]),
    ];
    for (name, types) in typed {
        let present = s.has_schema(types);
        checks.insert(
            name.into(),
            CheckResult::structured(
                CheckStatus::present_or(present, CheckStatus::Warning),
                [("present", json!(present))],
            ),
        );
    }
    checks
}

const LINKING_RULES: &[Rule] = &[
    ("internal_links", "Strengthen internal linking", &["Link to key pages from navigation and content", "Use descriptive anchor text"]),
    ("empty_anchors", "Fix links without a destination", &["Replace '#' and javascript: links with real URLs"]),
    ("nofollow_internal", "Remove nofollow from internal links", &["Let link equity flow to your own pages"]),
];

fn internal_linking(ev: &SiteEvidence, t: &SeoThresholds) -> Checks {
    let mut checks = Checks::new();
    let s = ev.snapshot;
    let min = t.min_internal_links;

    checks.insert(
        "internal_links".into(),
        CheckResult::structured(
            at_least(s.internal_links, min, min.div_ceil(3)),
            [
                ("internal", json!(s.internal_links)),
                ("external", json!(s.external_links)),
                ("minimum", json!(min)),
            ],
        ),
    );
    checks.insert(
        "empty_anchors".into(),
        CheckResult::measured(s.empty_anchors as f64, "links", none_found(s.empty_anchors)),
    );
    checks.insert(
        "nofollow_internal".into(),
        CheckResult::measured(s.nofollow_internal as f64, "links", none_found(s.nofollow_internal)),
    );
    checks
}

const TECHNICAL_RULES: &[Rule] = &[
    ("http_status", "Make the page return a successful status", &["Check server logs", "Fix upstream errors"]),
    ("doctype", "Declare an HTML5 doctype", &["Start the document with <!DOCTYPE html>"]),
    ("charset", "Declare the character encoding", &["Add <meta charset=\"utf-8\">"]),
    ("lang_attribute", "Set the page language", &["Add a lang attribute to the html element"]),
    ("page_weight", "Reduce HTML page weight", &["Remove inline data blobs", "Paginate long listings"]),
];

fn technical_issues(ev: &SiteEvidence, t: &SeoThresholds) -> Checks {
    let mut checks = Checks::new();
    let s = ev.snapshot;

    match ev.page {
        Some(page) => {
            checks.insert(
                "http_status".into(),
                CheckResult::measured(page.status as f64, "status", status_class(page.status)),
            );
            let kb = (s.size_bytes as f64 / 1024.0).round();
            checks.insert(
                "page_weight".into(),
                CheckResult::measured(
                    kb,
                    "KB",
                    CheckStatus::banded(kb, t.page_weight_kb.good_below, t.page_weight_kb.warning_below),
                ),
            );
        }
        None => {
            let reason = ev.page_error.unwrap_or("page unreachable");
            checks.insert("http_status".into(), CheckResult::flag_with(false, reason));
            checks.insert("page_weight".into(), CheckResult::flag_with(false, reason));
        }
    }

    let presence = |present: bool, value: serde_json::Value| {
        CheckResult::structured(
            CheckStatus::present_or(present, CheckStatus::Warning),
            [("present", json!(present)), ("value", value)],
        )
    };
    checks.insert("doctype".into(), presence(s.has_doctype, json!(null)));
    checks.insert("charset".into(), presence(s.charset.is_some(), json!(s.charset)));
    checks.insert("lang_attribute".into(), presence(s.lang.is_some(), json!(s.lang)));
    checks
}

const SECURITY_RULES: &[Rule] = &[
    ("https", "Serve the site over HTTPS", &["Install a TLS certificate", "Redirect HTTP to HTTPS"]),
    ("mixed_content", "Remove mixed content", &["Load every sub-resource over HTTPS"]),
    ("hsts", "Enable HTTP Strict Transport Security", &["Send Strict-Transport-Security with a long max-age"]),
    ("content_type_options", "Send X-Content-Type-Options: nosniff", &["Set the header at the web server or CDN"]),
];

fn security(ev: &SiteEvidence) -> Checks {
    let mut checks = Checks::new();
    let served_url = ev
        .page
        .and_then(|p| Url::parse(&p.final_url).ok())
        .unwrap_or_else(|| ev.url.clone());
    let https = served_url.scheme() == "https";
    let header = |name: &str| ev.page.and_then(|p| p.headers.get(name)).map(|v| v.trim().to_lowercase());

    checks.insert("https".into(), CheckResult::flag(https));

    let insecure = ev.snapshot.insecure_resources;
    let mixed_status = match (insecure, https) {
        (0, _) => CheckStatus::Good,
        (_, true) => CheckStatus::Critical,
        (_, false) => CheckStatus::Warning,
    };
    checks.insert(
        "mixed_content".into(),
        CheckResult::measured(insecure as f64, "resources", mixed_status),
    );

    let hsts = header("strict-transport-security");
    checks.insert(
        "hsts".into(),
        CheckResult::structured(
            CheckStatus::present_or(https && hsts.is_some(), CheckStatus::Warning),
            [("header", json!(hsts))],
        ),
    );

    let nosniff = header("x-content-type-options");
    checks.insert(
        "content_type_options".into(),
        CheckResult::structured(
            CheckStatus::present_or(nosniff.as_deref() == Some("nosniff"), CheckStatus::Warning),
            [("header", json!(nosniff))],
        ),
    );
    checks
}
