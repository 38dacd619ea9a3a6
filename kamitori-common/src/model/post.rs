use crate::model::{Id, shop::ShopMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const LANGUAGE_CODE_MAX_LEN: usize = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TranslationMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub shop_id: Id<ShopMarker>,
    pub original_text: String,
    pub image_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub translations: Vec<Translation>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Translation {
    pub id: Id<TranslationMarker>,
    pub language: LanguageCode,
    pub translated_content: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct NewPost {
    pub shop_id: Id<ShopMarker>,
    pub original_text: String,
    pub image_path: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewTranslation {
    pub language: LanguageCode,
    pub translated_content: String,
}

/// Short language tag such as `en` or `zh-tw`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The language code is invalid: {0}")]
pub struct InvalidLanguageCodeError(String);

impl LanguageCode {
    pub fn new(code: String) -> Result<Self, InvalidLanguageCodeError> {
        if !code.is_empty() && code.chars().count() <= LANGUAGE_CODE_MAX_LEN {
            Ok(Self(code))
        } else {
            Err(InvalidLanguageCodeError(code))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for LanguageCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        LanguageCode::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"LanguageCode"))
    }
}

/// Structured output requested from the content generator for a new post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct GeneratedPost {
    /// Enhanced Japanese post text.
    pub enhanced_text: String,
    pub en: String,
    pub zh_tw: String,
    pub zh_cn: String,
    pub ko: String,
}

impl GeneratedPost {
    pub const FIELDS: [&'static str; 5] = ["enhanced_text", "en", "zh_tw", "zh_cn", "ko"];

    /// One translation per non-empty field, Japanese first.
    #[must_use]
    pub fn into_translations(self) -> Vec<NewTranslation> {
        [
            ("ja", self.enhanced_text),
            ("en", self.en),
            ("zh-tw", self.zh_tw),
            ("zh-cn", self.zh_cn),
            ("ko", self.ko),
        ]
        .into_iter()
        .filter(|(_, content)| !content.trim().is_empty())
        .map(|(language, translated_content)| NewTranslation {
            language: LanguageCode(language.to_owned()),
            translated_content,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{GeneratedPost, LanguageCode};

    #[test]
    fn generated_post_maps_fields_to_language_codes() {
        let generated = GeneratedPost {
            enhanced_text: "新作ケーキ".to_owned(),
            en: "New cake".to_owned(),
            zh_tw: "新蛋糕".to_owned(),
            zh_cn: "新蛋糕".to_owned(),
            ko: "새 케이크".to_owned(),
        };

        let languages: Vec<_> = generated
            .into_translations()
            .into_iter()
            .map(|translation| translation.language.get().to_owned())
            .collect();

        assert_eq!(languages, ["ja", "en", "zh-tw", "zh-cn", "ko"]);
    }

    #[test]
    fn empty_fields_produce_no_translation() {
        let generated = GeneratedPost {
            enhanced_text: "新作ケーキ".to_owned(),
            en: "New cake".to_owned(),
            ko: "  ".to_owned(),
            ..GeneratedPost::default()
        };

        let translations = generated.into_translations();

        assert_eq!(translations.len(), 2);
        assert_eq!(translations[1].translated_content, "New cake");
    }

    #[test]
    fn language_code_length_is_bounded() {
        assert!(LanguageCode::new("zh-tw".to_owned()).is_ok());
        assert!(LanguageCode::new(String::new()).is_err());
        assert!(LanguageCode::new("x".repeat(11)).is_err());
    }
}
