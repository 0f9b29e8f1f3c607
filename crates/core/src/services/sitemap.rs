//! XML sitemap.

use std::fmt::Write as _;

use prompthub_common::AppResult;
use prompthub_db::{
    entities::category,
    repositories::{CategoryRepository, PromptRepository, PromptSitemapRow},
};

/// Most prompts listed in one sitemap (the protocol allows 50,000 URLs).
pub const MAX_SITEMAP_PROMPTS: u64 = 5000;

/// Pages listed regardless of content: path, change frequency, priority.
const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "daily", "1.0"),
    ("/prompts", "hourly", "0.9"),
    ("/categories", "weekly", "0.6"),
];

/// Sitemap service.
#[derive(Clone)]
pub struct SitemapService {
    category_repo: CategoryRepository,
    prompt_repo: PromptRepository,
    site_url: String,
}

impl SitemapService {
    /// Create a new sitemap service for the site at `site_url`.
    #[must_use]
    pub fn new(
        category_repo: CategoryRepository,
        prompt_repo: PromptRepository,
        site_url: &str,
    ) -> Self {
        Self {
            category_repo,
            prompt_repo,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Render the sitemap document.
    pub async fn render(&self) -> AppResult<String> {
        let categories = self.category_repo.find_all().await?;
        let prompts = self
            .prompt_repo
            .find_sitemap_rows(MAX_SITEMAP_PROMPTS)
            .await?;
        Ok(render_sitemap(&self.site_url, &categories, &prompts))
    }
}

/// Build the `urlset` document.
#[must_use]
pub fn render_sitemap(
    site_url: &str,
    categories: &[category::Model],
    prompts: &[PromptSitemapRow],
) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for (path, changefreq, priority) in STATIC_PAGES {
        push_url(&mut xml, &format!("{site_url}{path}"), None, changefreq, priority);
    }
    for category in categories {
        push_url(
            &mut xml,
            &format!("{site_url}/categories/{}", category.name),
            None,
            "daily",
            "0.7",
        );
    }
    for prompt in prompts {
        let lastmod = prompt
            .updated_at
            .unwrap_or(prompt.created_at)
            .format("%Y-%m-%d")
            .to_string();
        push_url(
            &mut xml,
            &format!("{site_url}/prompts/{}", prompt.id),
            Some(&lastmod),
            "weekly",
            "0.8",
        );
    }

    xml.push_str("</urlset>\n");
    xml
}

fn push_url(xml: &mut String, loc: &str, lastmod: Option<&str>, changefreq: &str, priority: &str) {
    let _ = write!(xml, "  <url>\n    <loc>{}</loc>\n", escape_xml(loc));
    if let Some(lastmod) = lastmod {
        let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
    }
    let _ = write!(
        xml,
        "    <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n"
    );
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn test_category(name: &str) -> category::Model {
        category::Model {
            id: format!("c-{name}"),
            name: name.to_string(),
            display_name: name.to_string(),
            icon: None,
            color: None,
            count: 0,
            sort_order: 0,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a&b<c>'\""), "a&amp;b&lt;c&gt;&apos;&quot;");
    }

    #[test]
    fn test_render_sitemap() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
        let prompts = vec![
            PromptSitemapRow {
                id: "p1".to_string(),
                created_at: created.into(),
                updated_at: Some(updated.into()),
            },
            PromptSitemapRow {
                id: "p2".to_string(),
                created_at: created.into(),
                updated_at: None,
            },
        ];

        let xml = render_sitemap("https://hub.test", &[test_category("r&d")], &prompts);

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://hub.test/</loc>"));
        assert!(xml.contains("<loc>https://hub.test/categories/r&amp;d</loc>"));
        let entry = |id: &str, date: &str| {
            format!("<loc>https://hub.test/prompts/{id}</loc>\n    <lastmod>{date}</lastmod>")
        };
        assert!(xml.contains(&entry("p1", "2025-04-02")));
        assert!(xml.contains(&entry("p2", "2025-03-01")));
        assert_eq!(xml.matches("<url>").count(), 6);
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[tokio::test]
    async fn test_render_from_repositories() {
        let category_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_category("coding")]])
            .into_connection();
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<category::Model>::new()])
            .into_connection();

        let service = SitemapService::new(
            CategoryRepository::new(Arc::new(category_db)),
            PromptRepository::new(Arc::new(prompt_db)),
            "https://hub.test/",
        );
        let xml = service.render().await.unwrap();

        assert!(xml.contains("https://hub.test/categories/coding"));
        assert!(!xml.contains("/prompts/"));
    }
}
