//! User-facing strings.
//!
//! Defaults are Arabic, matching the bot's audience. A JSON file with any
//! subset of the fields replaces them (`docbot run --messages ar.json`).
//! Templated strings use `{page}`, `{total}` and `{error}` placeholders.

use crate::error::DocBotError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub welcome: String,
    /// Sent instead of a chat reply when the model call fails.
    pub chat_apology: String,
    pub photo_received: String,
    pub document_received: String,
    pub converting_pdf: String,
    /// Uses `{page}` and `{total}`.
    pub reading_page: String,
    pub extracting: String,
    pub correcting: String,
    pub building_pdf: String,
    pub document_caption: String,
    /// Uses `{error}`.
    pub photo_failed: String,
    /// Uses `{error}`.
    pub document_failed: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            welcome: "مرحباً! 👋 أنا بوتك الذكي لإنشاء ملفات PDF الاحترافية.

🤖 يمكنني:
✅ التحدث معك والإجابة على أسئلتك
✅ استخراج النص من الصور وملفات PDF
✅ تصحيح جميع الأخطاء الإملائية
✅ معالجة جميع الرموز بشكل صحيح:
   • كيميائية: H₂O، CO₂، NAD⁺، FADH₂، Ca²⁺
   • رياضية: x², →, ≤, ≥, ∞, √, ∑
   • فيزيائية: °C, m/s², ΔG, λ, μ
✅ إنشاء PDF منسق بألوان احترافية

💬 كيف تستخدمني:
• تحدث معي عن أي شيء - سأفهمك وأساعدك
• أرسل لي صورة أو PDF - سأعالجه وأنشئ لك ملف منسق
• اطلب مني أي شيء - سأنفذ أوامرك

جرب الآن! أرسل لي رسالة أو ملف 📄"
                .to_string(),
            chat_apology: "عذراً، حدث خطأ في المحادثة. حاول مرة أخرى.".to_string(),
            photo_received: "🖼️ جاري معالجة الصورة...".to_string(),
            document_received: "📄 جاري معالجة الملف...".to_string(),
            converting_pdf: "🔄 جاري تحويل PDF إلى صور...".to_string(),
            reading_page: "📖 جاري قراءة الصفحة {page}/{total}...".to_string(),
            extracting: "📖 جاري استخراج النص...".to_string(),
            correcting: "✍️ جاري تصحيح جميع الأخطاء والرموز...".to_string(),
            building_pdf: "📝 جاري إنشاء ملف PDF المنسق...".to_string(),
            document_caption: "✅ تم إنشاء الملف بنجاح!\n\n✨ تم تصحيح جميع الأخطاء والرموز (كيميائية، رياضية، فيزيائية) بشكل صحيح."
                .to_string(),
            photo_failed: "❌ حدث خطأ أثناء معالجة الصورة:\n{error}".to_string(),
            document_failed: "❌ حدث خطأ أثناء معالجة الملف:\n{error}".to_string(),
        }
    }
}

impl Messages {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, DocBotError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocBotError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            DocBotError::InvalidConfig(format!("messages '{}': {}", path.display(), e))
        })
    }

    pub fn reading_page(&self, page: usize, total: usize) -> String {
        self.reading_page
            .replace("{page}", &page.to_string())
            .replace("{total}", &total.to_string())
    }

    pub fn photo_failed(&self, error: &DocBotError) -> String {
        self.photo_failed.replace("{error}", &error.to_string())
    }

    pub fn document_failed(&self, error: &DocBotError) -> String {
        self.document_failed.replace("{error}", &error.to_string())
    }
}
