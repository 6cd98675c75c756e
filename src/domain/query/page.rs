use serde::Serialize;

use crate::domain::query::Query;

/// 件数つきのページ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub per_page: usize,
    pub current_page: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, per_page: usize, current_page: usize) -> Self {
        Self {
            items,
            total,
            per_page,
            current_page,
        }
    }

    /// 最終ページ番号（空でも1）
    pub fn last_page(&self) -> usize {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 要素を変換する（件数情報はそのまま）
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
        })
    }
}

/// ページング結果、またはエクスポート用の未実行クエリ
#[derive(Debug, Clone, PartialEq)]
pub enum Paginated<T> {
    Page(Page<T>),
    Export(Query),
}

impl<T> Paginated<T> {
    pub fn into_page(self) -> Option<Page<T>> {
        match self {
            Paginated::Page(page) => Some(page),
            Paginated::Export(_) => None,
        }
    }

    pub fn into_query(self) -> Option<Query> {
        match self {
            Paginated::Page(_) => None,
            Paginated::Export(query) => Some(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_rounds_up() {
        let page = Page::new(vec![1, 2], 5, 2, 1);
        assert_eq!(page.last_page(), 3);
        assert!(page.has_more_pages());

        let empty: Page<i32> = Page::new(vec![], 0, 20, 1);
        assert_eq!(empty.last_page(), 1);
        assert!(!empty.has_more_pages());
    }
}
