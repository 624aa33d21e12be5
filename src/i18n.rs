use std::collections::HashMap;

pub struct I18n {
    translations: HashMap<String, HashMap<String, String>>,
    current_lang: String,
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut translations = HashMap::new();

        // 英文
        let mut en = HashMap::new();
        en.insert("no_records".to_string(), "No records found".to_string());
        en.insert("no_history".to_string(), "No history recorded yet ({0})".to_string());
        en.insert("duration_not_found".to_string(), "No command with id {0}, duration not recorded".to_string());
        en.insert("prev_cmd_required".to_string(), "like-recent-after needs --prev-cmd".to_string());
        en.insert("range_needs_both".to_string(), "--start and --end must be given together".to_string());
        en.insert("range_summary".to_string(), "{0} records from {1} to {2}".to_string());
        en.insert("error_open_store".to_string(), "Failed to open history store {0}".to_string());
        en.insert("error_insert".to_string(), "Failed to record command".to_string());
        en.insert("error_query".to_string(), "History query failed".to_string());
        en.insert("error_current_dir".to_string(), "Cannot determine the current directory".to_string());

        // 中文
        let mut zh = HashMap::new();
        zh.insert("no_records".to_string(), "没有找到记录".to_string());
        zh.insert("no_history".to_string(), "尚未记录任何历史 ({0})".to_string());
        zh.insert("duration_not_found".to_string(), "不存在 id 为 {0} 的命令，未记录耗时".to_string());
        zh.insert("prev_cmd_required".to_string(), "like-recent-after 需要 --prev-cmd 参数".to_string());
        zh.insert("range_needs_both".to_string(), "--start 与 --end 必须同时指定".to_string());
        zh.insert("range_summary".to_string(), "{1} 至 {2} 共 {0} 条记录".to_string());
        zh.insert("error_open_store".to_string(), "无法打开历史存储 {0}".to_string());
        zh.insert("error_insert".to_string(), "记录命令失败".to_string());
        zh.insert("error_query".to_string(), "历史查询失败".to_string());
        zh.insert("error_current_dir".to_string(), "无法确定当前目录".to_string());

        translations.insert("en".to_string(), en);
        translations.insert("zh".to_string(), zh);

        // 确定语言 - 支持多种语言代码格式
        let effective_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang: effective_lang.to_string(),
        }
    }

    /// Message for `key` in the current language, then English, then the key itself.
    pub fn t(&self, key: &str) -> String {
        [self.current_lang.as_str(), "en"]
            .into_iter()
            .find_map(|lang| self.translations.get(lang)?.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// `{0}`, `{1}`, ... are replaced positionally; the zh templates reorder them.
    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.t(key), |message, (i, arg)| message.replace(&format!("{{{}}}", i), arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_language_and_formats() {
        let en = I18n::new("en_US");
        assert_eq!(en.t_format("duration_not_found", &["7"]), "No command with id 7, duration not recorded");
        let zh = I18n::new("zh_CN");
        assert_eq!(zh.t("no_records"), "没有找到记录");
        assert_eq!(I18n::new("fr_FR").t("no_records"), "No records found");
        assert_eq!(en.t("missing_key"), "missing_key");
        assert_eq!(
            zh.t_format("range_summary", &["3", "2024-05-13", "2024-05-19"]),
            "2024-05-13 至 2024-05-19 共 3 条记录"
        );
    }
}
