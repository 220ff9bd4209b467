use serde::Serialize;

use crate::{constants::MAX_PAGE_SIZE, error::NotFound, form::Form};

const INVALID_PAGE: &str = "Invalid page.";

/// `page` / `limit` query parameters resolved against a resource's default page size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl PageQuery {
    pub fn from_form(form: &Form, default_limit: i64) -> Self {
        let page = form.get_number::<i64>("page").filter(|p| *p > 0).unwrap_or(1);
        let limit = form
            .get_number::<i64>("limit")
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE);

        Self { page, limit }
    }

    /// Row offset of the page; pages whose offset does not fit an `i64` are invalid.
    pub fn offset(&self) -> Result<i64, NotFound> {
        (self.page - 1)
            .checked_mul(self.limit)
            .ok_or_else(|| NotFound::new(INVALID_PAGE))
    }
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        query: PageQuery,
        base_path: &str,
        form: &Form,
    ) -> Result<Self, NotFound> {
        if rows.is_empty() {
            if query.page > 1 {
                return Err(NotFound::new(INVALID_PAGE));
            }
            return Ok(Self::no_rows());
        }

        let page_count = (total_rows + query.limit - 1) / query.limit;
        let link = |page: i64| format!("{base_path}?{}", form.with_value("page", &page.to_string()));

        Ok(Self {
            count: total_rows,
            next: (query.page < page_count).then(|| link(query.page + 1)),
            previous: (query.page > 1).then(|| link(query.page - 1)),
            results: rows,
        })
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_caps_page_size() {
        let form = Form::from_pairs(&[("limit", "1000"), ("page", "0")]);
        let query = PageQuery::from_form(&form, 6);

        assert_eq!(query, PageQuery { page: 1, limit: 100 });
        assert_eq!(PageQuery::from_form(&Form::default(), 6).limit, 6);
    }

    #[test]
    fn offset_follows_page() {
        let query = PageQuery { page: 3, limit: 10 };
        assert_eq!(query.offset().ok(), Some(20));
    }

    #[test]
    fn huge_page_is_invalid() {
        let form = Form::from_pairs(&[("page", "9223372036854775807"), ("limit", "10")]);
        let query = PageQuery::from_form(&form, 6);

        assert_eq!(query.page, i64::MAX);
        let error: potion::Error = query.offset().unwrap_err().into();
        assert_eq!(crate::error::status_of(&error), 404);
    }

    #[test]
    fn page_past_the_end_is_invalid() {
        let form = Form::from_pairs(&[("page", "4"), ("limit", "2")]);
        let query = PageQuery::from_form(&form, 6);
        let page: Result<PageContext<i32>, _> =
            PageContext::from_rows(vec![], 0, query, "/api/recipes/", &form);

        let error: potion::Error = page.unwrap_err().into();
        assert_eq!(crate::error::status_of(&error), 404);
        assert_eq!(error.info.as_deref(), Some("Invalid page."));
    }

    #[test]
    fn links_keep_filters() {
        let form = Form::from_pairs(&[("tags", "lunch"), ("page", "2"), ("limit", "2")]);
        let query = PageQuery::from_form(&form, 6);
        let page = PageContext::from_rows(vec![3, 4], 5, query, "/api/recipes/", &form).unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=lunch&limit=2&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=lunch&limit=2&page=1")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let form = Form::from_pairs(&[("page", "3"), ("limit", "2")]);
        let query = PageQuery::from_form(&form, 6);
        let page = PageContext::from_rows(vec![5], 5, query, "/api/users/", &form).unwrap();

        assert!(page.next.is_none());
        assert!(page.previous.is_some());
    }

    #[test]
    fn empty_result_set() {
        let page: PageContext<i32> =
            PageContext::from_rows(vec![], 0, PageQuery { page: 1, limit: 6 }, "/", &Form::default())
                .unwrap();

        assert_eq!(page.count, 0);
        assert!(page.next.is_none() && page.previous.is_none());
    }
}
