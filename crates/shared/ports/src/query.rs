use bourse_core::{OrderStatus, Side, Symbol, UserId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Equality filters over orders, ANDed together; `None` means unconstrained
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub symbol: Option<Symbol>,
    pub side: Option<Side>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, order: &bourse_core::Order) -> bool {
        self.user_id.is_none_or(|u| order.user_id == u)
            && self.symbol.as_ref().is_none_or(|s| &order.symbol == s)
            && self.side.is_none_or(|s| order.side == s)
            && self.status.is_none_or(|s| order.status == s)
    }
}

/// 1-based page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Clamps `page` to at least 1 and `per_page` into `1..=MAX_PER_PAGE`
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }

    pub fn limit(&self) -> usize {
        self.per_page as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let per_page = u64::from(request.per_page.max(1));
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    /// Convert every item, keeping the paging metadata; stops at the first error
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, E>>()?,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let request = PageRequest::new(0, 1_000);
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, MAX_PER_PAGE);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_last_page() {
        let request = PageRequest::default();
        assert_eq!(Page::<u8>::new(vec![], 0, request).last_page, 1);
        assert_eq!(Page::<u8>::new(vec![], 20, request).last_page, 1);
        assert_eq!(Page::<u8>::new(vec![], 21, request).last_page, 2);
    }

    #[test]
    fn test_try_map_keeps_metadata() {
        let page = Page::new(vec![1u8, 2, 3], 23, PageRequest::new(2, 3));
        let mapped = page.clone().try_map(|n| Ok::<_, ()>(u32::from(n) * 10)).unwrap();
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!((mapped.total, mapped.page, mapped.last_page), (23, 2, 8));

        let failed = page.try_map(|n| if n == 2 { Err("two") } else { Ok(n) });
        assert_eq!(failed, Err("two"));
    }
}
