//! Built-in sample reviews per category.
//!
//! Used to produce an offline estimate when the live source is unreachable
//! and nothing is cached. Results built from these are flagged as offline.

use async_trait::async_trait;
use tracing::info;

use super::{detect_category, RawListing, RawReview, ReviewSource};
use crate::error::VerdictResult;
use crate::model::ProductUrl;

struct Sample {
    title: &'static str,
    description: &'static str,
    reviews: &'static [&'static str],
}

const SMARTPHONE: Sample = Sample {
    title: "Premium Smartphone - Latest Model",
    description: "Advanced smartphone with high-resolution camera, long battery life, and premium build quality.",
    reviews: &[
        "The camera quality is absolutely stunning! Photos are crisp and colors are vibrant even in low light.",
        "Battery life is impressive, easily lasts a full day of heavy usage with fast charging support.",
        "Build quality feels premium with excellent materials and solid construction throughout.",
        "Performance is smooth and responsive, handles multitasking and gaming without any lag.",
        "Display is beautiful with vibrant colors and excellent brightness for outdoor use.",
        "The software experience is clean and intuitive with useful features and regular updates.",
        "Audio quality is surprisingly good for both calls and media playback through speakers.",
        "Fingerprint sensor is fast and accurate, face unlock works well in various lighting conditions.",
        "Camera app has great features including night mode and portrait photography options.",
        "Overall excellent value for money, would definitely recommend to others looking for a quality smartphone.",
    ],
};

const LAPTOP: Sample = Sample {
    title: "High-Performance Laptop - Professional Grade",
    description: "Powerful laptop designed for productivity with excellent performance, display quality, and build.",
    reviews: &[
        "Performance is outstanding for work and creative tasks, handles demanding applications smoothly.",
        "Battery life exceeds expectations, getting 8+ hours of productivity work on a single charge.",
        "Keyboard is comfortable for long typing sessions with good key travel and backlight.",
        "Display quality is excellent with accurate colors and sharp text, great for design work.",
        "Build quality is solid and premium, feels durable and well-constructed throughout.",
        "Thermal management is good, stays cool under normal use and the fan is quiet.",
        "Storage speed is impressive with a fast SSD, boot times under 10 seconds consistently.",
        "Port selection is adequate with USB-C, USB-A, and HDMI for connectivity needs.",
        "Audio quality is decent for video calls and media consumption, clear speakers.",
        "Great laptop for professionals, excellent balance of performance, portability and features.",
    ],
};

const TV: Sample = Sample {
    title: "4K Smart TV - Premium Display",
    description: "Ultra HD smart television with vibrant colors, smart features, and immersive viewing experience.",
    reviews: &[
        "Picture quality is breathtaking with vibrant colors and deep blacks, movies look cinematic.",
        "Smart features work smoothly with quick app loading and a responsive user interface.",
        "Sound quality is surprisingly good for built-in speakers, dialogue clear and music rich.",
        "Remote control is intuitive and responsive, easy to navigate through menus and apps.",
        "Setup was straightforward with clear instructions and a helpful guided configuration process.",
        "Brightness levels are excellent, works well in bright rooms with good anti-glare coating.",
        "4K upscaling works impressively, even older content looks sharp and detailed on screen.",
        "Motion handling is excellent for sports and action movies, minimal blur or artifacts.",
        "Design is sleek and modern, complements living room furniture and decor perfectly.",
        "Excellent TV for the price, great balance of features, quality and smart functionality.",
    ],
};

const HEADPHONES: Sample = Sample {
    title: "Wireless Noise Cancelling Headphones",
    description: "Over-ear wireless headphones with active noise cancellation, deep bass and long battery life.",
    reviews: &[
        "Sound is rich and balanced, the bass is punchy without drowning out vocals.",
        "Noise cancellation is excellent on flights and in busy offices, very impressive.",
        "Comfortable for hours, the ear cushions are soft and the weight is well distributed.",
        "Battery easily lasts a week of daily commuting, charging is quick over USB-C.",
        "Bluetooth connection is stable and pairing with two devices works smoothly.",
        "The mic is average on calls in windy conditions, but fine indoors.",
        "Great value for the price compared with more expensive brands.",
    ],
};

const GENERAL: Sample = Sample {
    title: "Popular Product - Customer Favourite",
    description: "Well-reviewed product with reliable quality, practical design and good value.",
    reviews: &[
        "Quality is good for the price, feels sturdy and well made.",
        "Works exactly as described, performance has been reliable for months.",
        "Design is simple and practical, looks nice on the shelf.",
        "Delivery was fast and the packaging was secure, no damage at all.",
        "Good value for money, would recommend it to friends and family.",
        "Durability seems decent so far, though a few parts feel a bit plasticky.",
        "Setup was easy and the instructions were clear enough.",
    ],
};

fn sample_for(category: &str) -> &'static Sample {
    match category {
        "smartphone" => &SMARTPHONE,
        "laptop" => &LAPTOP,
        "tv" => &TV,
        "headphones" => &HEADPHONES,
        _ => &GENERAL,
    }
}

/// Serves the built-in samples for whatever category the URL suggests.
#[derive(Debug, Default, Clone)]
pub struct SampleReviewSource;

impl SampleReviewSource {
    pub fn new() -> Self {
        Self
    }

    /// Sample listing for `category`; unknown categories get general samples.
    pub fn listing_for(&self, category: &str) -> RawListing {
        let sample = sample_for(category);
        RawListing {
            title: sample.title.to_string(),
            category: Some(category.to_string()),
            brand: None,
            price: None,
            description: sample.description.to_string(),
            image: None,
            reviews: sample
                .reviews
                .iter()
                .map(|text| RawReview::new(*text, None))
                .collect(),
        }
    }
}

#[async_trait]
impl ReviewSource for SampleReviewSource {
    async fn fetch_reviews(&self, url: &ProductUrl) -> VerdictResult<RawListing> {
        let category = detect_category(&url.canonical, "", "");
        info!(url = %url.canonical, %category, "Serving sample reviews");
        Ok(self.listing_for(&category))
    }

    fn name(&self) -> &'static str {
        "sample"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_follows_url_category() {
        let url = ProductUrl::parse("https://www.amazon.in/Acme-Smart-TV-55/dp/B0ABC12345").unwrap();
        let listing = SampleReviewSource::new().fetch_reviews(&url).await.unwrap();
        assert_eq!(listing.category.as_deref(), Some("tv"));
        assert!(listing.reviews.len() >= 7);
    }

    #[test]
    fn test_unknown_category_gets_general_samples() {
        let listing = SampleReviewSource::new().listing_for("camera");
        assert_eq!(listing.category.as_deref(), Some("camera"));
        assert_eq!(listing.title, GENERAL.title);
    }
}
