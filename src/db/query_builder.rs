use rust_decimal::Decimal;
use sea_orm::{
    sea_query::LikeExpr, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::product;
use crate::models::Page;

/// Paginated, filtered and ordered query over a single entity
pub struct QueryBuilder<E: EntityTrait> {
    query: Select<E>,
    page: u64,
    limit: u64,
}

impl<E: EntityTrait> Default for QueryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> QueryBuilder<E> {
    pub fn new() -> Self {
        Self {
            query: E::find(),
            page: 1,
            limit: 20,
        }
    }

    /// Pages are numbered from 1; `limit` is clamped to at least one row.
    pub fn paginate(mut self, page: u64, limit: u64) -> Self {
        self.page = page.max(1);
        self.limit = limit.max(1);
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.query = self.query.filter(condition);
        self
    }

    pub fn order_by<C>(mut self, column: C, desc: bool) -> Self
    where
        C: ColumnTrait,
    {
        self.query = if desc {
            self.query.order_by_desc(column)
        } else {
            self.query.order_by_asc(column)
        };
        self
    }

    /// Runs the query, returning the requested page and the filtered row count.
    pub async fn execute<C>(self, db: &C) -> Result<Page<E::Model>, sea_orm::DbErr>
    where
        C: ConnectionTrait,
        E::Model: Send + Sync,
    {
        let paginator = self.query.paginate(db, self.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(self.page - 1).await?;
        Ok(Page::new(items, self.page, self.limit, total))
    }
}

/// Helper for building search conditions from typed clauses. Clauses are ANDed.
#[derive(Default)]
pub struct SearchBuilder {
    conditions: Vec<Condition>,
}

impl SearchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches when `column` contains any of `needles` literally; `%` and `_` in a
    /// needle are not wildcards. Blank needles are ignored.
    pub fn add_contains_any<C: ColumnTrait>(mut self, column: C, needles: &[String]) -> Self {
        let any = needles
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .fold(Condition::any(), |acc, n| {
                acc.add(column.like(contains_pattern(n)))
            });
        if !any.is_empty() {
            self.conditions.push(any);
        }
        self
    }

    pub fn add_eq<C: ColumnTrait, V>(mut self, column: C, value: V) -> Self
    where
        V: Into<sea_orm::Value>,
    {
        self.conditions.push(Condition::all().add(column.eq(value)));
        self
    }

    pub fn add_gte<C: ColumnTrait, V>(mut self, column: C, value: V) -> Self
    where
        V: Into<sea_orm::Value>,
    {
        self.conditions.push(Condition::all().add(column.gte(value)));
        self
    }

    pub fn build(self) -> Condition {
        self.conditions
            .into_iter()
            .fold(Condition::all(), |acc, cond| acc.add(cond))
    }
}

const LIKE_ESCAPE: char = '|';

fn contains_pattern(needle: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// One typed product search clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductFilter {
    Category(Uuid),
    /// Product name contains at least one of the keywords
    Keywords(Vec<String>),
    MinRating(Decimal),
}

/// Product search: a list of clauses that must all hold. Only visible products are
/// ever returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSearch {
    pub filters: Vec<ProductFilter>,
}

impl ProductSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category_id: Uuid) -> Self {
        self.filters.push(ProductFilter::Category(category_id));
        self
    }

    /// Splits `text` on whitespace into keywords.
    pub fn keywords(mut self, text: &str) -> Self {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if !words.is_empty() {
            self.filters.push(ProductFilter::Keywords(words));
        }
        self
    }

    pub fn min_rating(mut self, rating: Decimal) -> Self {
        self.filters.push(ProductFilter::MinRating(rating));
        self
    }

    pub fn to_condition(&self) -> Condition {
        self.filters
            .iter()
            .fold(
                SearchBuilder::new().add_eq(product::Column::IsVisible, true),
                |builder, filter| match filter {
                    ProductFilter::Category(id) => builder.add_eq(product::Column::CategoryId, *id),
                    ProductFilter::Keywords(words) => {
                        builder.add_contains_any(product::Column::Name, words)
                    }
                    ProductFilter::MinRating(rating) => {
                        builder.add_gte(product::Column::Rating, *rating)
                    }
                },
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql_for(search: &ProductSearch) -> String {
        product::Entity::find()
            .filter(search.to_condition())
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn empty_search_only_filters_visibility() {
        let sql = sql_for(&ProductSearch::new());
        assert!(sql.contains(r#""is_visible" = TRUE"#));
        assert!(!sql.contains("LIKE"));
    }

    #[test]
    fn keywords_are_ored_and_clauses_anded() {
        let search = ProductSearch::new()
            .keywords("red  mug")
            .min_rating(dec!(3.5));
        let sql = sql_for(&search);

        assert!(sql.contains(
            r#""name" LIKE '%red%' ESCAPE '|' OR "products"."name" LIKE '%mug%' ESCAPE '|'"#
        ));
        assert!(sql.contains(r#""rating" >= 3.5"#));
        assert!(sql.contains(" AND "));
    }

    #[test]
    fn keywords_are_bound_not_spliced() {
        let search = ProductSearch::new().keywords("x'); DROP TABLE products; --");
        let condition = search.to_condition();
        let statement = product::Entity::find()
            .filter(condition)
            .build(DbBackend::Postgres);
        assert!(!statement.sql.contains("DROP TABLE"));
        assert!(statement.values.is_some());
    }

    #[test]
    fn wildcards_in_keywords_match_literally() {
        let sql = sql_for(&ProductSearch::new().keywords("50% snake_case a|b"));

        assert!(sql.contains(r#"LIKE '%50|%%' ESCAPE '|'"#));
        assert!(sql.contains(r#"LIKE '%snake|_case%' ESCAPE '|'"#));
        assert!(sql.contains(r#"LIKE '%a||b%' ESCAPE '|'"#));
    }

    #[test]
    fn blank_keywords_add_no_clause() {
        assert!(ProductSearch::new().keywords("   ").filters.is_empty());
    }
}
