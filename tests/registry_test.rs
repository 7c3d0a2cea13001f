//! 全局注册表的集成测试
//!
//! 第一次仓储操作之后注册表冻结，不再接受新的存储提供者

use std::sync::Arc;

use rat_domain::testing::{MemoryAdapter, install_memory_provider};
use rat_domain::*;

struct Invoice;
impl Element for Invoice {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .provider("billing")
            .field("number", string_field(Some(20)).required())
    }
}

struct Receipt;
impl Element for Receipt {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .provider("archive")
            .field("number", string_field(Some(20)))
    }
}

#[tokio::test]
async fn test_registry_freezes_after_first_operation() {
    let billing = install_memory_provider("billing").unwrap();
    assert!(!global_registry().is_frozen());

    let invoice = Repository::<Invoice>::new()
        .create(data! {"number" => "INV-1"})
        .await
        .unwrap();
    assert!(global_registry().is_frozen());
    assert_eq!(billing.len("invoice"), 1);
    assert_eq!(element_by_name("Invoice").unwrap().schema_name(), "invoice");

    let err = register_provider("archive", Arc::new(MemoryAdapter::new())).unwrap_err();
    assert!(matches!(err, DomainError::Config { .. }));

    // 提供者未注册的元素在操作时报配置错误
    let err = Repository::<Receipt>::new().query().all().await.unwrap_err();
    assert!(matches!(err, DomainError::Config { .. }));

    let again = Repository::<Invoice>::new().get(invoice.id()).await.unwrap();
    assert_eq!(again, invoice);
}
