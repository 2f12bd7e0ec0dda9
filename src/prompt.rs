//! Prompt template with a single document placeholder.
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder replaced by the document's HTML.
pub const MARKER: &str = "{html_content}";

pub const DEFAULT_TEMPLATE: &str = r#"你是一个专业的偶像粉丝账号运营者。我会给你一个 Fandom Wiki 页面的 HTML 内容，请根据其中的信息，生成至少 10 条 Twitter 风格的动态（推文）。

Wiki HTML 内容：
{html_content}

要求：
1. 每条推文不超过280字符（中文约140字）
2. 可以包含emoji，但不要过多
3. 风格要像真实的粉丝分享，有热情但不夸张
4. 推文类型要多样化，包括但不限于：
   - 成员基本介绍
   - 生日祝福模板（只在生日当天生成）
   - 昵称/外号趣事
   - 身高/星座/血型等冷知识
   - 出身地相关
   - 加入团体的经历
   - 鼓励应援的内容
   - 日常安利推荐
   - 和其他成员的关系
   - 绝技、绝招
   - 爱好
   - 如果有动物塑，可以发挥一下
   - 如果有应援色，可以说明
5. 使用日文撰写
6. 每条推文用 "---" 分隔
7. 必须生成至少10条不同角度的推文
8. 不要加hashtag

请直接输出推文内容，不要输出其他解释。"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_marker(&self) -> bool {
        self.0.contains(MARKER)
    }

    /// Replace the first marker with `content`. Without a marker the template is returned as is.
    pub fn resolve(&self, content: &str) -> String {
        self.0.replacen(MARKER, content, 1)
    }

    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        tokio::fs::read_to_string(path).await.map(Self)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self(DEFAULT_TEMPLATE.to_string())
    }
}

impl From<String> for PromptTemplate {
    fn from(value: String) -> Self {
        Self(value)
    }
}
