//! Human-readable text: recommendation explanations, the spoken verdict and
//! the short insight paragraph.

use crate::model::{AnalysisResult, Explanation, Listing};

/// Compare a recommended `candidate` against the `query` product.
pub fn explain(query: Listing<'_>, candidate: Listing<'_>, similarity: f64) -> Explanation {
    let score_delta = candidate.analysis.score.saturating_sub(query.analysis.score);

    let query_pros: Vec<&str> = query.analysis.pro_names().collect();
    let candidate_cons: Vec<&str> = candidate.analysis.con_names().collect();
    let pros_gained: Vec<String> = candidate
        .analysis
        .pro_names()
        .filter(|p| !query_pros.contains(p))
        .map(String::from)
        .collect();
    let cons_reduced: Vec<String> = query
        .analysis
        .con_names()
        .filter(|c| !candidate_cons.contains(c))
        .map(String::from)
        .collect();

    let price_delta = match (query.product.price, candidate.product.price) {
        (Some(q), Some(c)) if q.is_finite() && c.is_finite() => Some(c - q),
        _ => None,
    };

    let mut explanation = Explanation {
        score_delta,
        pros_gained,
        cons_reduced,
        price_delta,
        category_match: query.product.category == candidate.product.category,
        similarity,
        text: String::new(),
    };
    explanation.text = render(&explanation, query.analysis.score, candidate.analysis.score);
    explanation
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second, ..] => format!("{} and {}", first, second),
    }
}

fn render(e: &Explanation, query_score: u8, candidate_score: u8) -> String {
    let mut sentence = format!(
        "Scores {} points higher ({}/100 vs {}/100)",
        e.score_delta, candidate_score, query_score
    );
    if !e.pros_gained.is_empty() {
        sentence.push_str(&format!(", with customers praising the {}", join_names(&e.pros_gained)));
    }
    if !e.cons_reduced.is_empty() {
        sentence.push_str(&format!(
            ", and fewer complaints about the {}",
            join_names(&e.cons_reduced)
        ));
    }
    sentence.push('.');

    match e.price_delta {
        Some(d) if d.is_finite() && d < -0.005 => {
            sentence.push_str(&format!(" It costs {:.2} less.", -d));
        }
        Some(d) if d.is_finite() && d > 0.005 => {
            sentence.push_str(&format!(" It costs {:.2} more.", d));
        }
        Some(d) if d.is_finite() => sentence.push_str(" It costs the same."),
        _ => {}
    }
    sentence
}

fn category_subject(category: &str) -> &'static str {
    match category {
        "smartphone" => "This smartphone",
        "laptop" => "This laptop",
        "tv" => "This television",
        "headphones" => "These headphones",
        "camera" => "This camera",
        "tablet" => "This tablet",
        "watch" => "This smartwatch",
        _ => "This product",
    }
}

/// Spoken summary of an analysis, phrased for the product category.
pub fn voice_verdict(score: u8, pros: &[(String, f64)], cons: &[(String, f64)], category: &str) -> String {
    let subject = category_subject(category);
    let plural = subject.starts_with("These");
    let (stance, strength) = match (score, plural) {
        (75..=u8::MAX, false) => ("comes highly recommended", "an excellent"),
        (75..=u8::MAX, true) => ("come highly recommended", "an excellent"),
        (60..=74, false) => ("is a solid choice", "a good"),
        (60..=74, true) => ("are a solid choice", "a good"),
        (40..=59, false) => ("has mixed reviews", "an average"),
        (40..=59, true) => ("have mixed reviews", "an average"),
        _ => ("may not be the best option", "a below average"),
    };
    let mut verdict = format!(
        "{} {} with {} score of {} out of 100.",
        subject,
        stance,
        strength,
        score
    );

    if let Some((first, _)) = pros.first() {
        let second = pros.get(1).map(|(p, _)| p.as_str());
        let clause = match (category, second) {
            ("smartphone", Some(s)) => format!(" Users particularly love the {} and {}", first, s),
            ("smartphone", None) => format!(" Users particularly love the {}", first),
            ("laptop", Some(s)) => format!(" The {} receives excellent feedback, along with the {}", first, s),
            ("laptop", None) => format!(" The {} receives excellent feedback", first),
            (_, Some(s)) => format!(" Customers appreciate the {} and {}", first, s),
            (_, None) => format!(" Customers appreciate the {}", first),
        };
        verdict.push_str(&clause);
    }

    if let Some((first, _)) = cons.first() {
        if pros.is_empty() {
            verdict.push_str(&format!(" Some users have concerns about the {}", first));
        } else {
            verdict.push_str(&format!(". However, some users have concerns about the {}", first));
        }
        if let Some((second, _)) = cons.get(1) {
            verdict.push_str(&format!(" and {}", second));
        }
    }
    if !pros.is_empty() || !cons.is_empty() {
        verdict.push('.');
    }

    let closing = match score {
        70..=u8::MAX if matches!(category, "smartphone" | "laptop") => {
            " This is a reliable choice for most users."
        }
        70..=u8::MAX => " Overall, this is a quality product worth considering.",
        50..=69 => " Consider your specific needs before purchasing.",
        _ => " You might want to explore other options.",
    };
    verdict.push_str(closing);
    verdict
}

/// Short assessment with top strengths, top concerns and a review volume note.
pub fn insight(analysis: &AnalysisResult) -> String {
    let mut parts = vec![match analysis.score {
        75..=u8::MAX => "This product receives strong positive feedback from customers.".to_string(),
        60..=74 => "This product has generally positive reviews with some mixed feedback.".to_string(),
        40..=59 => "This product receives mixed reviews with notable concerns.".to_string(),
        _ => "This product has significant negative feedback from customers.".to_string(),
    }];

    let strengths: Vec<String> = analysis
        .pros
        .iter()
        .take(2)
        .filter(|(_, p)| *p > 0.1)
        .map(|(n, _)| n.clone())
        .collect();
    if !strengths.is_empty() {
        parts.push(format!("Customers particularly appreciate the {}.", strengths.join(" and ")));
    }

    let concerns: Vec<String> = analysis
        .cons
        .iter()
        .take(2)
        .filter(|(_, p)| *p < -0.1)
        .map(|(n, _)| n.clone())
        .collect();
    if !concerns.is_empty() {
        parts.push(format!("Common concerns include the {}.", concerns.join(" and ")));
    }

    let n = analysis.meta.reviews_used;
    parts.push(match n {
        20..=usize::MAX => format!("Analysis based on {} customer reviews provides high confidence.", n),
        10..=19 => format!("Analysis based on {} reviews provides good confidence.", n),
        _ => format!("Limited to {} reviews, consider checking more sources.", n),
    });
    parts.join(" ")
}
