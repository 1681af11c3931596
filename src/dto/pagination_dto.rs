use serde::{Deserialize, Serialize};

pub const INITIAL_PAGE: u32 = 1;
pub const PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 100;

// Query string de los listados: ?page=&limit=&search=&status=
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(alias = "searchValue")]
    pub search: Option<String>,
    pub status: Option<String>,
}

/// Página solicitada, ya normalizada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Valores fuera de rango se ajustan en vez de rechazarse
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(i64::from(INITIAL_PAGE)).clamp(1, i64::from(u32::MAX));
        let limit = limit
            .unwrap_or(i64::from(PAGE_LIMIT))
            .clamp(1, i64::from(MAX_PAGE_LIMIT));
        Self {
            page: page as u32,
            limit: limit as u32,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl From<&ListQuery> for PageRequest {
    fn from(query: &ListQuery) -> Self {
        Self::new(query.page, query.limit)
    }
}

/// Resultado de una consulta paginada
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

// Response de los listados: { data, meta }
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PageResponse<T> {
    pub fn new(page: Page<T>, request: PageRequest) -> Self {
        let limit = u64::from(request.limit);
        Self {
            meta: PageMeta {
                page: request.page,
                total_items: page.total,
                total_pages: page.total.div_ceil(limit),
            },
            data: page.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults_and_clamping() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 50 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_negative_values_are_clamped() {
        assert_eq!(PageRequest::new(Some(-1), Some(-20)), PageRequest { page: 1, limit: 1 });

        let query: ListQuery = serde_json::from_value(serde_json::json!({"page": -1})).unwrap();
        assert_eq!(PageRequest::from(&query).page, 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(Some(1), Some(50)).offset(), 0);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_total_pages() {
        let page = Page { items: vec![1, 2], total: 101 };
        let response = PageResponse::new(page, PageRequest::new(Some(2), Some(50)));
        assert_eq!(response.meta.total_pages, 3);
        assert_eq!(response.meta.total_items, 101);
        assert_eq!(response.meta.page, 2);

        let empty: Page<u8> = Page { items: vec![], total: 0 };
        assert_eq!(PageResponse::new(empty, PageRequest::new(None, None)).meta.total_pages, 0);
    }
}
