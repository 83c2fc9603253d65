//! Prompt preparation.
//!
//! Every request gets a fresh uniqueness token (random seed plus millisecond
//! timestamp) and, for most variants, a randomly drawn angle. Both are baked
//! into the prompt once, when the request is prepared, so upstream caching
//! cannot hand back the same text twice. The collider topic, and therefore
//! its cache key, is drawn at the same moment.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use fogwalker_core::{ContentVariant, LabellessMeta, Result};

/// Topics the collider variant argues about.
pub const COLLIDER_TOPICS: [&str; 3] = [
    "Tech accelerationism vs. the case for braking technology",
    "Globalization vs. localization",
    "Individualism vs. collectivism",
];

const WORMHOLE_DOMAINS: &[&str] = &[
    "deep-sea biology",
    "medieval cartography",
    "soil microbiology",
    "forgotten programming languages",
    "the history of timekeeping",
    "fungal networks",
    "maritime signal flags",
    "pre-industrial color dyes",
    "glacial archaeology",
    "the economics of lighthouses",
];

const LABELLESS_ANGLES: &[&str] = &[
    "a quiet objection to something everyone agrees on",
    "a confession about abandoning a popular tool",
    "a defence of an unfashionable habit",
    "an observation that only makes sense after midnight",
    "a small theory about why meetings exist",
    "a letter to a future self who stopped reading the news",
];

const COLLIDER_ANGLES: &[&str] = &[
    "argue from first principles",
    "argue from historical precedent",
    "argue from the perspective of the next generation",
    "argue from economic consequences",
    "argue from everyday lived experience",
];

const LABELLESS_AUTHORS: &[&str] = &[
    "An anonymous programmer",
    "A laid-off algorithm engineer",
    "A philosophy PhD student",
    "A former big-tech product manager",
    "An independent researcher",
    "A freelance writer",
];

const LABELLESS_SOURCES: &[&str] = &[
    "Personal blog (deleted)",
    "A niche forum",
    "An academic community",
    "A private mailing list",
    "Encrypted notes",
];

/// A request with everything random already decided.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    /// Variant being served
    pub variant: ContentVariant,
    /// Final prompt text sent upstream
    pub prompt: String,
    /// Server cache key
    pub cache_key: String,
    /// Collider topic
    pub topic: Option<String>,
    /// Uniqueness token: hex seed and millisecond timestamp
    pub seed: String,
    /// Angle or domain injected into the prompt
    pub angle: Option<&'static str>,
    labelless_meta: Option<LabellessMeta>,
    request_id: Option<Uuid>,
}

impl PreparedRequest {
    /// Prepares a request with thread-local randomness.
    pub fn new(variant: ContentVariant) -> Self {
        Self::prepare_with(variant, &mut rand::thread_rng())
    }

    /// Prepares a request drawing every random choice from `rng`.
    pub fn prepare_with<R: Rng>(variant: ContentVariant, rng: &mut R) -> Self {
        let bytes: [u8; 6] = rng.gen();
        let seed = format!("{}-{}", hex::encode(bytes), Utc::now().timestamp_millis());

        let pick = |pool: &[&'static str], rng: &mut R| pool.choose(rng).copied();

        let (topic, angle) = match variant {
            ContentVariant::Sediment => (None, None),
            ContentVariant::Wormhole => (None, pick(WORMHOLE_DOMAINS, rng)),
            ContentVariant::Labelless => (None, pick(LABELLESS_ANGLES, rng)),
            ContentVariant::Collider => (
                pick(&COLLIDER_TOPICS, rng).map(str::to_string),
                pick(COLLIDER_ANGLES, rng),
            ),
        };

        let labelless_meta = (variant == ContentVariant::Labelless).then(|| LabellessMeta {
            author: pick(LABELLESS_AUTHORS, rng).unwrap_or_default().to_string(),
            source: pick(LABELLESS_SOURCES, rng).unwrap_or_default().to_string(),
            likes: rng.gen_range(1..=50),
            comments: "none".into(),
        });
        let request_id = (variant == ContentVariant::Wormhole).then(|| {
            let raw: [u8; 16] = rng.gen();
            uuid::Builder::from_random_bytes(raw).into_uuid()
        });

        let prompt = render_prompt(variant, topic.as_deref(), angle, &seed);

        Self {
            variant,
            prompt,
            cache_key: variant.cache_key(topic.as_deref()),
            topic,
            seed,
            angle,
            labelless_meta,
            request_id,
        }
    }

    /// Parses complete upstream output and attaches request-scoped fields.
    pub fn finalize(&self, raw: &str) -> Result<Value> {
        let payload = self.variant.shape().parse(raw)?;
        Ok(self.enrich(payload))
    }

    fn enrich(&self, mut payload: Value) -> Value {
        if let Some(obj) = payload.as_object_mut() {
            if let Some(meta) = &self.labelless_meta {
                obj.insert("meta".into(), json!(meta));
            }
            if let Some(id) = self.request_id {
                obj.insert("_requestId".into(), json!(id.simple().to_string()));
            }
        }
        payload
    }
}

fn render_prompt(
    variant: ContentVariant,
    topic: Option<&str>,
    angle: Option<&str>,
    seed: &str,
) -> String {
    let body = match variant {
        ContentVariant::Sediment => SEDIMENT_TEMPLATE.to_string(),
        ContentVariant::Wormhole => {
            WORMHOLE_TEMPLATE.replace("{domain}", angle.unwrap_or("an obscure field"))
        }
        ContentVariant::Labelless => {
            LABELLESS_TEMPLATE.replace("{angle}", angle.unwrap_or("an unremarkable thought"))
        }
        ContentVariant::Collider => COLLIDER_TEMPLATE
            .replace("{topic}", topic.unwrap_or(COLLIDER_TOPICS[0]))
            .replace("{angle}", angle.unwrap_or("argue honestly")),
    };
    format!("{body}\n\nRequest token: {seed}. Do not mention this token.")
}

const SEDIMENT_TEMPLATE: &str = "You curate stale news. Produce 8 short items about events that \
happened at least a year ago and no longer matter to anyone.\n\n\
Return a JSON array only. Each element must be an object:\n\
{\"id\": number, \"title\": string, \"date\": \"YYYY-MM-DD\", \"summary\": string, \"category\": string}";

const WORMHOLE_TEMPLATE: &str = "You open wormholes into unfamiliar fields. Write an in-depth \
article (800-1200 words) about one surprising idea from {domain}.\n\n\
Return a JSON object:\n\
{\"title\": string, \"author\": string, \"content\": string, \"tag\": string}";

const LABELLESS_TEMPLATE: &str = "Write a short, unsigned piece of prose (200-400 words): \
{angle}. No title, no headings, no lists, no Markdown. Plain paragraphs only.";

const COLLIDER_TEMPLATE: &str = "You generate colliding opinions. For the topic below, write two \
fully opposed positions.\n\nTopic: {topic}\nApproach: {angle}\n\n\
Return a JSON object:\n\
{\"left\": {\"title\": string, \"content\": \"500-800 words\"}, \
\"right\": {\"title\": string, \"content\": \"500-800 words\"}}\n\n\
Both positions must be internally consistent, rest on different values and \
premises, and reflect disagreements that really exist.";

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_collider_topic_drives_cache_key() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let req = PreparedRequest::prepare_with(ContentVariant::Collider, &mut rng);
            let topic = req.topic.clone().unwrap();
            assert!(COLLIDER_TOPICS.contains(&topic.as_str()));
            assert_eq!(req.cache_key, format!("collider_content_{topic}"));
            assert!(req.prompt.contains(&topic));
        }
    }

    #[test]
    fn test_every_topic_is_reachable() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let req = PreparedRequest::prepare_with(ContentVariant::Collider, &mut rng);
            seen.insert(req.topic.unwrap());
        }
        assert_eq!(seen.len(), COLLIDER_TOPICS.len());
    }

    #[test]
    fn test_seed_is_unique_per_request() {
        let a = PreparedRequest::new(ContentVariant::Sediment);
        let b = PreparedRequest::new(ContentVariant::Sediment);
        assert_ne!(a.seed, b.seed);
        assert!(a.prompt.contains(&a.seed));
        assert_eq!(a.cache_key, "sediment_content");
        assert!(a.angle.is_none());
    }

    #[test]
    fn test_angles_for_non_list_variants() {
        for variant in [
            ContentVariant::Wormhole,
            ContentVariant::Labelless,
            ContentVariant::Collider,
        ] {
            let req = PreparedRequest::new(variant);
            let angle = req.angle.unwrap();
            assert!(req.prompt.contains(angle), "{variant} prompt lacks its angle");
        }
    }

    #[test]
    fn test_labelless_meta_is_fixed_per_request() {
        let req = PreparedRequest::new(ContentVariant::Labelless);
        let first = req.finalize("  Some prose.\n").unwrap();
        let second = req.finalize("Other prose").unwrap();
        assert_eq!(first["content"], "Some prose.");
        assert_eq!(first["meta"], second["meta"]);

        let likes = first["meta"]["likes"].as_u64().unwrap();
        assert!((1..=50).contains(&likes));
        assert_eq!(first["meta"]["comments"], "none");
        assert!(LABELLESS_AUTHORS.contains(&first["meta"]["author"].as_str().unwrap()));
    }

    #[test]
    fn test_wormhole_gets_request_id() {
        let req = PreparedRequest::new(ContentVariant::Wormhole);
        let payload = req
            .finalize(r#"{"title":"T","author":"A","content":"C","tag":"x"}"#)
            .unwrap();
        assert_eq!(payload["_requestId"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn test_sediment_payload_is_untouched() {
        let req = PreparedRequest::new(ContentVariant::Sediment);
        let payload = req.finalize("```json\n[]\n```").unwrap();
        assert_eq!(payload, json!([]));
    }

    #[test]
    fn test_finalize_rejects_wrong_shape() {
        let req = PreparedRequest::new(ContentVariant::Collider);
        assert!(req.finalize(r#"{"left":{"title":"A","content":"x"}}"#).is_err());
    }
}
