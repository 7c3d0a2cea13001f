//! 多语言错误消息模块
//!
//! 使用rat_embed_lang框架提供统一的错误消息多语言支持

use std::collections::HashMap;
use rat_embed_lang::register_translations;

/// 错误消息翻译注册器
pub struct ErrorMessageI18n;

/// 单个消息键的三语翻译
fn entry(
    translations: &mut HashMap<String, HashMap<String, String>>,
    key: &str,
    zh: &str,
    en: &str,
    ja: &str,
) {
    let mut messages = HashMap::new();
    messages.insert("zh-CN".to_string(), zh.to_string());
    messages.insert("en-US".to_string(), en.to_string());
    messages.insert("ja-JP".to_string(), ja.to_string());
    translations.insert(key.to_string(), messages);
}

impl ErrorMessageI18n {
    /// 注册所有错误消息翻译
    pub fn register_all_translations() {
        let mut translations = HashMap::new();

        // 校验与结构错误
        entry(&mut translations, "error.validation",
            "数据校验失败: {message}",
            "Validation failed: {message}",
            "データ検証が失敗しました: {message}");
        entry(&mut translations, "error.not_found",
            "未找到 {schema} 记录: {criteria}",
            "{schema} object not found: {criteria}",
            "{schema} のレコードが見つかりません: {criteria}");
        entry(&mut translations, "error.invalid_attribute",
            "{element} 没有声明属性 '{name}'",
            "{element} has no declared attribute '{name}'",
            "{element} に属性 '{name}' は宣言されていません");
        entry(&mut translations, "error.incorrect_usage",
            "用法错误: {message}",
            "Incorrect usage: {message}",
            "使用方法が正しくありません: {message}");

        // 适配器与配置错误
        entry(&mut translations, "error.adapter",
            "{adapter} 适配器操作失败: {message}",
            "{adapter} adapter operation failed: {message}",
            "{adapter} アダプター操作が失敗しました: {message}");
        entry(&mut translations, "error.config",
            "配置错误: {message}",
            "Configuration error: {message}",
            "設定エラー: {message}");
        entry(&mut translations, "error.serialization",
            "数据序列化失败: {message}",
            "Data serialization failed: {message}",
            "データシリアライズが失敗しました: {message}");

        // 注册表
        entry(&mut translations, "error.provider_not_found",
            "存储提供者 '{provider}' 未注册",
            "Storage provider '{provider}' is not registered",
            "ストレージプロバイダー '{provider}' は登録されていません");
        entry(&mut translations, "error.provider_exists",
            "存储提供者 '{provider}' 已经注册",
            "Storage provider '{provider}' is already registered",
            "ストレージプロバイダー '{provider}' は既に登録されています");
        entry(&mut translations, "error.registry_frozen",
            "注册表已冻结，无法注册存储提供者 '{provider}'",
            "Registry is frozen, cannot register provider '{provider}'",
            "レジストリは凍結されています。プロバイダー '{provider}' を登録できません");
        entry(&mut translations, "error.registry_closed",
            "注册表已关闭",
            "Registry has been closed",
            "レジストリは閉じられています");

        // 元素声明
        entry(&mut translations, "error.abstract_element",
            "抽象元素 {element} 不能被实例化",
            "Abstract element {element} cannot be instantiated",
            "抽象要素 {element} はインスタンス化できません");
        entry(&mut translations, "error.aggregate_missing",
            "实体 {element} 需要声明所属聚合",
            "Entity {element} needs to be associated with an aggregate",
            "エンティティ {element} は集約を宣言する必要があります");
        entry(&mut translations, "error.multiple_identifiers",
            "{element} 只能声明一个标识字段，实际: {fields}",
            "{element} may declare only one identifier field, found: {fields}",
            "{element} は識別子フィールドを一つだけ宣言できます: {fields}");

        register_translations(translations);
    }

    /// 初始化多语言系统
    pub fn init() {
        Self::register_all_translations();

        // 从环境变量获取语言设置，默认为zh-CN
        let lang = std::env::var("RAT_LANG")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_else(|_| "zh-CN".to_string());

        apply_language(&lang);
    }
}

/// 规范化语言代码后切换语言
pub fn apply_language(lang: &str) {
    use rat_embed_lang::normalize_language_code;
    let normalized_lang = normalize_language_code(lang);
    set_language(&normalized_lang);
}

// 重新导出rat_embed_lang的函数
pub use rat_embed_lang::{t, tf, set_language, current_language};
