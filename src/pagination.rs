use sea_orm::{ColumnTrait, Order, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;

use crate::cursor;
use crate::error::AppError;

pub const DEFAULT_TAKE: u64 = 10;
pub const MAX_TAKE: u64 = 100;

/// Fixed per endpoint, never chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub take: u64,
    /// Sequence number of the last row the caller has already seen.
    pub after: Option<i64>,
}

impl PageRequest {
    pub fn parse(take: Option<u64>, token: Option<&str>) -> Result<Self, AppError> {
        let take = match take {
            None | Some(0) => DEFAULT_TAKE,
            Some(n) => n.min(MAX_TAKE),
        };
        let after = token
            .filter(|c| !c.trim().is_empty())
            .map(cursor::decode)
            .transpose()?;
        Ok(Self { take, after })
    }

    /// Resumes strictly after `after` and fetches one extra row so the caller
    /// learns whether another page exists without a count query.
    pub fn apply<S, C>(&self, select: S, seq_column: C, direction: Direction) -> S
    where
        S: QueryFilter + QueryOrder + QuerySelect,
        C: ColumnTrait,
    {
        let select = match (self.after, direction) {
            (Some(after), Direction::Ascending) => select.filter(seq_column.gt(after)),
            (Some(after), Direction::Descending) => select.filter(seq_column.lt(after)),
            (None, _) => select,
        };
        let order = match direction {
            Direction::Ascending => Order::Asc,
            Direction::Descending => Order::Desc,
        };
        select.order_by(seq_column, order).limit(self.take + 1)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Trims the look-ahead row. The cursor points at the last row kept.
    pub fn from_rows<F>(mut rows: Vec<T>, take: u64, seq: F) -> Self
    where
        F: Fn(&T) -> i64,
    {
        let take = take as usize;
        if rows.len() > take {
            rows.truncate(take);
            let next_cursor = rows.last().map(|row| cursor::encode(seq(row)));
            Self {
                items: rows,
                next_cursor,
            }
        } else {
            Self {
                items: rows,
                next_cursor: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_defaults_and_caps() {
        assert_eq!(PageRequest::parse(None, None).unwrap().take, DEFAULT_TAKE);
        assert_eq!(PageRequest::parse(Some(0), None).unwrap().take, DEFAULT_TAKE);
        assert_eq!(PageRequest::parse(Some(3), None).unwrap().take, 3);
        assert_eq!(PageRequest::parse(Some(10_000), None).unwrap().take, MAX_TAKE);
    }

    #[test]
    fn blank_cursor_means_first_page() {
        assert_eq!(PageRequest::parse(None, Some("  ")).unwrap().after, None);
    }

    #[test]
    fn cursor_is_decoded() {
        let req = PageRequest::parse(Some(2), Some(&cursor::encode(7))).unwrap();
        assert_eq!(req.after, Some(7));
    }

    #[test]
    fn bad_cursor_is_rejected() {
        assert!(PageRequest::parse(None, Some("%%%")).is_err());
    }

    #[test]
    fn full_page_yields_cursor_of_last_kept_row() {
        let page = Page::from_rows(vec![1_i64, 2, 3], 2, |seq| *seq);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.next_cursor, Some(cursor::encode(2)));
    }

    #[test]
    fn short_page_has_no_cursor() {
        let page = Page::from_rows(vec![3_i64], 2, |seq| *seq);
        assert_eq!(page.items, vec![3]);
        assert_eq!(page.next_cursor, None);

        let page = Page::from_rows(vec![1_i64, 2], 2, |seq| *seq);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn descending_rows_keep_their_order() {
        let page = Page::from_rows(vec![9_i64, 8, 7, 6], 3, |seq| *seq);
        assert_eq!(page.items, vec![9, 8, 7]);
        assert_eq!(page.next_cursor, Some(cursor::encode(7)));
    }
}
