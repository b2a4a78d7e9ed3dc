//! Job listing criteria shared by both stores.

use crate::models::Job;
use crate::types::SortOrder;

/// Conjunctive job filter. Every field is optional; the default matches all jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    /// Exact match on `buyer.email`.
    pub buyer_email: Option<String>,
    /// Exact match on `category`.
    pub category: Option<String>,
    /// Case-insensitive substring of `title`.
    pub search: Option<String>,
    /// Order by the stored `deadline` string; insertion order when absent.
    pub sort: Option<SortOrder>,
}

impl JobQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_buyer(email: impl Into<String>) -> Self {
        Self {
            buyer_email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(email) = &self.buyer_email {
            if &job.doc.buyer.email != email {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &job.doc.category != category {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            if !job.doc.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Filter and order an in-memory collection. The sort is stable, so equal
    /// deadlines keep insertion order like the SQL tie-breaker.
    pub fn apply<'a, I>(&self, jobs: I) -> Vec<Job>
    where
        I: IntoIterator<Item = &'a Job>,
    {
        let mut out: Vec<Job> = jobs.into_iter().filter(|j| self.matches(j)).cloned().collect();
        match self.sort {
            Some(SortOrder::Asc) => out.sort_by(|a, b| a.doc.deadline.cmp(&b.doc.deadline)),
            Some(SortOrder::Desc) => out.sort_by(|a, b| b.doc.deadline.cmp(&a.doc.deadline)),
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::job_doc;
    use uuid::Uuid;

    fn job(email: &str, title: &str, category: &str, deadline: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            doc: job_doc(email, title, category, deadline),
        }
    }

    fn sample() -> Vec<Job> {
        vec![
            job("a@x.com", "Logo ABC redesign", "design", "2024-03-01"),
            job("b@x.com", "Fix abc parser", "development", "2024-01-15"),
            job("a@x.com", "abcdef landing page", "design", "2024-02-10"),
            job("c@x.com", "SEO audit", "marketing", "2024-01-01"),
        ]
    }

    fn titles(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.doc.title.as_str()).collect()
    }

    #[test]
    fn test_default_query_returns_everything_in_order() {
        let jobs = sample();
        assert_eq!(JobQuery::all().apply(&jobs).len(), 4);
        assert_eq!(JobQuery::all().apply(&jobs)[0].doc.title, "Logo ABC redesign");
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let jobs = sample();
        let query = JobQuery {
            search: Some("abc".into()),
            ..JobQuery::default()
        };
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["Logo ABC redesign", "Fix abc parser", "abcdef landing page"]
        );
    }

    #[test]
    fn test_search_sort_and_filter_combine() {
        let jobs = sample();
        let mut query = JobQuery {
            search: Some("abc".into()),
            sort: Some(SortOrder::Asc),
            ..JobQuery::default()
        };
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["Fix abc parser", "abcdef landing page", "Logo ABC redesign"]
        );

        query.category = Some("design".into());
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["abcdef landing page", "Logo ABC redesign"]
        );

        query.sort = Some(SortOrder::Desc);
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["Logo ABC redesign", "abcdef landing page"]
        );
    }

    #[test]
    fn test_sort_is_chronological_across_offsets_and_precision() {
        let stored = |title: &str, deadline: &str| Job {
            id: Uuid::new_v4(),
            doc: job_doc("a@x.com", title, "design", deadline)
                .for_insert()
                .unwrap(),
        };
        let jobs = vec![
            stored("late", "2024-01-01T23:00:00-05:00"),
            stored("early", "2024-01-02T01:00:00Z"),
            stored("fractional", "2024-01-02T01:00:00.250Z"),
            stored("spaced", "2024-01-02 03:30:00+00:00"),
            stored("date only", "2024-01-02"),
        ];

        let query = JobQuery {
            sort: Some(SortOrder::Asc),
            ..JobQuery::default()
        };
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["date only", "early", "fractional", "spaced", "late"]
        );

        let query = JobQuery {
            sort: Some(SortOrder::Desc),
            ..JobQuery::default()
        };
        assert_eq!(
            titles(&query.apply(&jobs)),
            vec!["late", "spaced", "fractional", "early", "date only"]
        );
    }

    #[test]
    fn test_by_buyer_is_exact() {
        let jobs = sample();
        let found = JobQuery::by_buyer("a@x.com").apply(&jobs);
        assert_eq!(found.len(), 2);
        assert!(JobQuery::by_buyer("A@x.com").apply(&jobs).is_empty());
    }
}
