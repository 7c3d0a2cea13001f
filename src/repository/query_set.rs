//! 延迟查询集合

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;

use rat_logger::debug;

use crate::adapter::{FilterCriteria, StorageRecord};
use crate::error::DomainResult;
use crate::model::{Element, ElementMeta, Entity, meta};
use crate::registry::global_registry;
use crate::types::{DataValue, QueryCondition, QueryOperator, SortConfig};

/// 不可变的查询描述，所有构建方法都返回新的查询集合
///
/// 只有结果方法（[`all`](Self::all) 等）才会访问存储，每次调用都重新求值
pub struct QuerySet<T: Element> {
    filters: BTreeMap<String, DataValue>,
    excludes: BTreeMap<String, DataValue>,
    order_by: Vec<String>,
    page: usize,
    per_page: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> QuerySet<T> {
    /// 创建空查询，每页条数取全局配置
    pub fn new() -> Self {
        Self {
            filters: BTreeMap::new(),
            excludes: BTreeMap::new(),
            order_by: Vec::new(),
            page: 1,
            per_page: crate::config::current().default_per_page.max(1),
            _marker: PhantomData,
        }
    }

    /// 添加过滤条件，键可以带 `__gte` 等查找后缀
    pub fn filter(&self, key: &str, value: impl Into<DataValue>) -> Self {
        let mut next = self.clone();
        next.filters.insert(key.to_string(), value.into());
        next
    }

    pub fn filter_all(&self, criteria: HashMap<String, DataValue>) -> Self {
        let mut next = self.clone();
        next.filters.extend(criteria);
        next
    }

    /// 添加排除条件；同时满足全部排除条件的记录被排除
    pub fn exclude(&self, key: &str, value: impl Into<DataValue>) -> Self {
        let mut next = self.clone();
        next.excludes.insert(key.to_string(), value.into());
        next
    }

    pub fn exclude_all(&self, criteria: HashMap<String, DataValue>) -> Self {
        let mut next = self.clone();
        next.excludes.extend(criteria);
        next
    }

    /// 追加排序字段，`-` 前缀表示降序，重复字段被忽略
    pub fn order_by(&self, field: &str) -> Self {
        let mut next = self.clone();
        if !next.order_by.iter().any(|existing| existing == field) {
            next.order_by.push(field.to_string());
        }
        next
    }

    pub fn order_by_all(&self, fields: &[&str]) -> Self {
        fields.iter().fold(self.clone(), |query, field| query.order_by(field))
    }

    /// 设置页码，小于1时取1
    pub fn page(&self, page: usize) -> Self {
        let mut next = self.clone();
        next.page = page.max(1);
        next
    }

    /// 设置每页条数，小于1时取1
    pub fn per_page(&self, per_page: usize) -> Self {
        let mut next = self.clone();
        next.per_page = per_page.max(1);
        next
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.per_page
    }

    /// 转换为适配器使用的过滤参数：字段名换成存储属性名，值换成存储值
    pub fn criteria(&self, meta: &ElementMeta) -> FilterCriteria {
        let order_by = if self.order_by.is_empty() {
            &meta.options().order_by
        } else {
            &self.order_by
        };
        FilterCriteria {
            page: self.page,
            per_page: self.per_page,
            order_by: order_by
                .iter()
                .map(|spec| {
                    let mut sort = SortConfig::parse(spec);
                    sort.field = meta.attribute_for(&sort.field);
                    sort
                })
                .collect(),
            filters: conditions(meta, &self.filters),
            excludes: conditions(meta, &self.excludes),
        }
    }

    /// 求值并返回当前页
    pub async fn all(&self) -> DomainResult<ResultSet<T>> {
        let meta = meta::<T>()?;
        let registry = global_registry();
        registry.freeze();
        let adapter = registry.get_adapter_for(&meta)?;

        let criteria = self.criteria(&meta);
        debug!(
            "查询 {}: filters={:?}, excludes={:?}, order_by={:?}, page={}, per_page={}",
            meta.schema_name(),
            criteria.filters,
            criteria.excludes,
            criteria.order_by,
            criteria.page,
            criteria.per_page
        );
        let result = adapter.filter_objects(&meta, &criteria).await?;
        let items = result
            .items
            .into_iter()
            .map(Entity::<T>::from_storage)
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(ResultSet {
            items,
            total: result.total,
            page: self.page,
            per_page: self.per_page,
        })
    }

    /// 当前页每个实体的字段映射
    pub async fn values(&self) -> DomainResult<Vec<HashMap<String, DataValue>>> {
        Ok(self.all().await?.iter().map(Entity::to_dict).collect())
    }

    /// 当前页的条数
    pub async fn count(&self) -> DomainResult<usize> {
        Ok(self.all().await?.len())
    }

    /// 满足条件的总数
    pub async fn total(&self) -> DomainResult<u64> {
        Ok(self.all().await?.total)
    }

    pub async fn exists(&self) -> DomainResult<bool> {
        Ok(self.per_page(1).all().await?.total > 0)
    }

    /// 当前页的第一个实体
    pub async fn first(&self) -> DomainResult<Option<Entity<T>>> {
        Ok(self.all().await?.items.into_iter().next())
    }

    /// 当前页下标为 `index` 的实体
    pub async fn get_index(&self, index: usize) -> DomainResult<Option<Entity<T>>> {
        Ok(self.all().await?.items.into_iter().nth(index))
    }

    pub async fn has_next(&self) -> DomainResult<bool> {
        Ok(self.all().await?.has_next())
    }

    pub async fn has_prev(&self) -> DomainResult<bool> {
        Ok(self.all().await?.has_prev())
    }
}

/// 查询键值转换为存储层条件
fn conditions(meta: &ElementMeta, entries: &BTreeMap<String, DataValue>) -> Vec<QueryCondition> {
    entries
        .iter()
        .map(|(key, value)| {
            let mut condition = QueryCondition::from_lookup(key, value.clone());
            if let Some(field) = meta.field(&condition.field) {
                condition.value = match (&condition.operator, &condition.value) {
                    (QueryOperator::In | QueryOperator::NotIn, DataValue::Array(items)) => {
                        DataValue::Array(items.iter().map(|item| field.to_storage(item)).collect())
                    }
                    (_, value) => field.to_storage(value),
                };
            }
            condition.field = meta.attribute_for(&condition.field);
            condition
        })
        .collect()
}

impl<T: Element> Default for QuerySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Clone for QuerySet<T> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            excludes: self.excludes.clone(),
            order_by: self.order_by.clone(),
            page: self.page,
            per_page: self.per_page,
            _marker: PhantomData,
        }
    }
}

impl<T: Element> fmt::Debug for QuerySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("element", &crate::model::meta::short_type_name::<T>())
            .field("filters", &self.filters)
            .field("excludes", &self.excludes)
            .field("order_by", &self.order_by)
            .field("page", &self.page)
            .field("per_page", &self.per_page)
            .finish()
    }
}

/// 一页查询结果
pub struct ResultSet<T: Element> {
    pub items: Vec<Entity<T>>,
    /// 满足条件的总数
    pub total: u64,
    pub page: usize,
    pub per_page: usize,
}

impl<T: Element> ResultSet<T> {
    /// 之后是否还有记录
    pub fn has_next(&self) -> bool {
        (self.page as u64).saturating_mul(self.per_page as u64) < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn first(&self) -> Option<&Entity<T>> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity<T>> {
        self.items.iter()
    }

    /// 当前页记录的存储形式
    pub fn to_storage(&self) -> Vec<StorageRecord> {
        self.items.iter().map(Entity::to_storage).collect()
    }
}

impl<T: Element> IntoIterator for ResultSet<T> {
    type Item = Entity<T>;
    type IntoIter = std::vec::IntoIter<Entity<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T: Element> IntoIterator for &'a ResultSet<T> {
    type Item = &'a Entity<T>;
    type IntoIter = std::slice::Iter<'a, Entity<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Element> Index<usize> for ResultSet<T> {
    type Output = Entity<T>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<T: Element> fmt::Debug for ResultSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("total", &self.total)
            .field("page", &self.page)
            .field("per_page", &self.per_page)
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::convenience::*;
    use crate::model::ElementDecl;

    struct QueryPerson;
    impl Element for QueryPerson {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .order_by(&["-age"])
                .field("name", string_field(Some(50)))
                .field("age", integer_field(None, None))
                .field("team", reference_field::<QueryPerson>())
                .field("token", uuid_field())
        }
    }

    #[test]
    fn test_builders_return_new_sets() {
        let base = QuerySet::<QueryPerson>::new().per_page(5);
        let filtered = base.filter("name", "John").order_by("age").order_by("age").page(0);
        assert!(base.filters.is_empty());
        assert_eq!(filtered.order_by, vec!["age".to_string()]);
        assert_eq!(filtered.current_page(), 1);
        assert_eq!(filtered.page_size(), 5);

        let ordered = filtered.order_by_all(&["-name", "age"]);
        assert_eq!(ordered.order_by, vec!["age".to_string(), "-name".to_string()]);
    }

    #[test]
    fn test_criteria_translation() {
        let meta = meta::<QueryPerson>().unwrap();
        let token = uuid::Uuid::new_v4();
        let criteria = QuerySet::<QueryPerson>::new()
            .filter("team", "t1")
            .filter("age__gte", 18)
            .filter("token", token)
            .exclude("name__icontains", "bot")
            .criteria(&meta);

        let fields: Vec<&str> = criteria.filters.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["age", "team_id", "token"]);
        assert_eq!(criteria.filters[2].value, DataValue::String(token.to_string()));
        assert!(criteria.excludes[0].case_insensitive);

        // 未指定排序时使用元素的默认排序
        assert_eq!(criteria.order_by, vec![SortConfig::parse("-age")]);
    }

    #[test]
    fn test_result_set_pagination_flags() {
        let first = ResultSet::<QueryPerson> {
            items: Vec::new(),
            total: 4,
            page: 1,
            per_page: 2,
        };
        assert!(first.has_next());
        assert!(!first.has_prev());

        let second = ResultSet::<QueryPerson> {
            items: Vec::new(),
            total: 4,
            page: 2,
            per_page: 2,
        };
        assert!(!second.has_next());
        assert!(second.has_prev());
    }

    #[test]
    fn test_has_next_on_huge_page() {
        let far = ResultSet::<QueryPerson> {
            items: Vec::new(),
            total: 4,
            page: usize::MAX,
            per_page: 2,
        };
        assert!(!far.has_next());
        assert!(far.has_prev());

        let set = QuerySet::<QueryPerson>::new().page(usize::MAX);
        assert_eq!(set.current_page(), usize::MAX);
        assert!(set.criteria(&meta::<QueryPerson>().unwrap()).offset() > 0);
    }
}
