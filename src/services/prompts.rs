use crate::core::model::{AnalysisResult, LifePeriod};
use crate::core::state::PeriodSlots;

/// Length and style directives shared by every period writer.
const VOLUME_INSTRUCTION: &str = "\
## Length requirements
- The content field must be **at least 1500 characters** long.
- Depict scenes and episodes **in the detail of a novel**.
- Use dialogue generously to bring the moments to life.
- Include sensory description (sight, sound, smell, touch, taste).
- Trace the person's inner thoughts and changes of feeling closely.";

struct PeriodBrief {
    tone: &'static str,
    topics: &'static [&'static str],
    style: &'static [&'static str],
}

fn brief(period: LifePeriod) -> PeriodBrief {
    match period {
        LifePeriod::Childhood => PeriodBrief {
            tone: "warm and tender",
            topics: &[
                "the story of the birth and the family background",
                "the childhood home and neighbourhood",
                "parents, grandparents and siblings",
                "kindergarten and primary school",
                "childhood friends and games",
                "first memories and the happiest moments",
                "family trips and special occasions",
            ],
            style: &[
                "a warm, lyrical voice that reads like a novel",
                "the innocent gaze and curiosity of a child",
                "sensory description",
                "dialogue that makes scenes vivid",
            ],
        },
        LifePeriod::Youth => PeriodBrief {
            tone: "full of passion and growth",
            topics: &[
                "middle and high school: studies, friendships, teachers",
                "adolescence and the forming of identity",
                "first love and relationships",
                "university or vocational training",
                "searching for a path, dreams, the first job",
                "leaving home and discovering oneself",
                "setbacks and how they were overcome",
            ],
            style: &[
                "a dynamic, vivid voice that reads like a novel",
                "growing pains and realisations shown as concrete scenes",
                "an emphasis on hope and the will to take on challenges",
                "dialogue that makes scenes vivid",
            ],
        },
        LifePeriod::MiddleAge => PeriodBrief {
            tone: "mature and responsible",
            topics: &[
                "marriage and building a household",
                "the birth and raising of children",
                "professional growth and challenges",
                "building financial security",
                "the changing relationship with parents",
                "experiences of success and failure",
                "important decisions and their consequences",
            ],
            style: &[
                "a mature, thoughtful voice that reads like a novel",
                "responsibility and devotion shown as concrete scenes",
                "lively conversations between spouses and with children",
                "the depth and weight of life",
            ],
        },
        LifePeriod::Mature => PeriodBrief {
            tone: "seasoned and wise",
            topics: &[
                "the peak of a career and its achievements",
                "children growing up and leaving home",
                "caring for parents and saying goodbye",
                "health problems and coping with them",
                "looking for a second life and preparing for retirement",
                "grandchildren",
                "new hobbies and interests",
            ],
            style: &[
                "a seasoned, contemplative voice that reads like a novel",
                "wisdom and insight drawn out of concrete experience",
                "a tone of gratitude and reflection",
                "loss and new beginnings described with care",
            ],
        },
        LifePeriod::Elderly => PeriodBrief {
            tone: "reflective and wise",
            topics: &[
                "life after retirement",
                "looking after health and adapting to age",
                "grandchildren",
                "the twilight years with a spouse",
                "friendships that lasted a lifetime",
                "feelings on looking back over a life",
                "messages for the next generation",
            ],
            style: &[
                "a warm, retrospective voice that reads like a novel",
                "the completion and acceptance of a life shown as concrete scenes",
                "wisdom and lessons passed on naturally through dialogue",
                "a moving, resonant close",
            ],
        },
    }
}

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn analyzer_system_prompt(language: &str) -> String {
    format!(
        "You are an expert in analysing life-story texts.\n\
        \n## Role\n\
        Analyse the given text and extract:\n\
        - the protagonist's name\n\
        - the birth year (when it can be inferred)\n\
        - the current age (when it can be inferred)\n\
        - a summary of the whole story\n\
        - the life periods that are mentioned ({})\n\
        - the main themes\n\
        \n## Notes\n\
        - Only extract information that is clearly supported by the text.\n\
        - Leave birth_year and current_age null when they cannot be determined.\n\
        - Respond in {}.",
        LifePeriod::ALL.map(|p| p.label()).join(", "),
        language
    )
}

pub fn analysis_user_prompt(transcript: &str) -> String {
    format!("Please analyse the following life-story text:\n\n{}", transcript)
}

pub fn period_system_prompt(period: LifePeriod, language: &str) -> String {
    let brief = brief(period);
    format!(
        "You are an autobiography writer specialising in {label} ({ages}).\n\
        \n## Role\n\
        From the given life-story text, extract the parts that belong to {label} ({ages}) \
        and write them up in detail as an autobiography chapter that is {tone}.\n\
        \n## Information to gather\n{topics}\n\
        \n## Writing style\n{style}\n\
        \n{volume}\n\
        \n## Important\n\
        - Set period to \"{label}\" and age_range to \"{ages}\".\n\
        - If the text contains nothing about this period, set has_content to false.\n\
        - Do not guess or invent anything.\n\
        - Write in {language}.",
        label = period.label(),
        ages = period.age_range(),
        tone = brief.tone,
        topics = bullets(brief.topics),
        style = bullets(brief.style),
        volume = VOLUME_INSTRUCTION,
        language = language,
    )
}

pub fn period_user_prompt(transcript: &str) -> String {
    format!(
        "Find the story of this period in the following life-story text and write it as an autobiography.\n\
        \n\
        Write the content field in detail, at least 1500 characters, like a novel with scene description and dialogue.\n\
        \n\
        Life-story text:\n{}",
        transcript
    )
}

pub fn integrator_system_prompt(language: &str) -> String {
    format!(
        "You are an editor who assembles autobiographies.\n\
        \n## Role\n\
        Combine the chapters written for each life period into one complete autobiography.\n\
        \n## Tasks\n\
        1. Create an engaging title for the autobiography.\n\
        2. Write a moving prologue of at least 500 characters.\n\
        3. Arrange the chapters so the periods flow naturally into each other.\n\
        4. Write a meaningful epilogue of at least 500 characters.\n\
        5. List at least 5 key_themes and at least 5 life_lessons.\n\
        \n## Style\n\
        - Literary and moving prose.\n\
        - Narration that draws the reader's empathy.\n\
        - A natural chronological flow.\n\
        \n## Important\n\
        - Only use the content provided. Do not invent new facts.\n\
        - Only write chapters for periods that have content.\n\
        - Write in {}.",
        language
    )
}

/// Integration request. Every period appears in canonical order, either with its extraction or
/// with an explicit insufficient-information marker.
pub fn integration_user_prompt(analysis: &AnalysisResult, periods: &PeriodSlots) -> String {
    let mut sections = String::new();
    for (period, outcome) in periods.iter() {
        sections.push_str(&format!("\n## {} ({})\n", period.label(), period.age_range()));
        match outcome.content() {
            Some(chapter) => {
                sections.push_str(&format!(
                    "Title: {}\nContent: {}\nKey events: {}\nEmotions: {}\nLessons: {}\n",
                    chapter.title,
                    chapter.content,
                    chapter.key_events.join(", "),
                    chapter.emotions.join(", "),
                    chapter.lessons_learned.as_deref().unwrap_or("none"),
                ));
            }
            None => sections.push_str(INSUFFICIENT_INFORMATION),
        }
    }

    let unknown = "unknown".to_string();
    format!(
        "Write a complete autobiography from the material below.\n\
        \n## Author\n\
        Name: {name}\n\
        Birth year: {birth}\n\
        Current age: {age}\n\
        \n## Life summary\n{summary}\n\
        \n## Detected life periods\n{periods}\n\
        \n## Main themes\n{themes}\n\
        \n---\n{sections}---\n\
        \nCombine the material above into one finished autobiography with a title, a prologue, \
        chapters (each with period, title and content) and an epilogue. \
        Use the period label from each section header as the chapter's period.",
        name = analysis.author_name,
        birth = analysis.birth_year.map(|y| y.to_string()).unwrap_or_else(|| unknown.clone()),
        age = analysis.current_age.map(|a| a.to_string()).unwrap_or(unknown),
        summary = analysis.summary,
        periods = analysis.detected_periods.join(", "),
        themes = analysis.main_themes.join(", "),
        sections = sections,
    )
}

pub const INSUFFICIENT_INFORMATION: &str = "There is insufficient information about this period.\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::PeriodExtraction;
    use crate::core::state::PeriodOutcome;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            author_name: "Kim Younghee".to_string(),
            birth_year: Some(1955),
            current_age: None,
            summary: "Born in Andong, became a teacher.".to_string(),
            detected_periods: vec!["Childhood".to_string(), "Youth".to_string()],
            main_themes: vec!["family".to_string(), "education".to_string()],
        }
    }

    #[test]
    fn test_period_prompts_are_distinct_and_self_contained() {
        for period in LifePeriod::ALL {
            let prompt = period_system_prompt(period, "Korean");
            assert!(prompt.contains(period.label()));
            assert!(prompt.contains("at least 1500 characters"));
            assert!(prompt.contains("has_content to false"));
            assert!(prompt.contains("Write in Korean."));
            for other in LifePeriod::ALL.into_iter().filter(|p| *p != period) {
                assert_ne!(prompt, period_system_prompt(other, "Korean"));
            }
        }
    }

    #[test]
    fn test_integration_prompt_lists_every_period_in_order() {
        let chapter = PeriodExtraction {
            period: "Youth".to_string(),
            age_range: "ages 13-29".to_string(),
            title: "The Seoul Years".to_string(),
            content: "I moved to Seoul.".to_string(),
            key_events: vec!["moved".to_string(), "graduated".to_string()],
            emotions: vec!["fear".to_string()],
            lessons_learned: None,
            has_content: true,
        };
        let slots = PeriodSlots::from_ordered(vec![
            PeriodOutcome::Failed("timeout".to_string()),
            PeriodOutcome::Extracted(chapter),
        ]);

        let prompt = integration_user_prompt(&analysis(), &slots);

        let positions: Vec<usize> = LifePeriod::ALL
            .iter()
            .map(|p| prompt.find(&format!("## {} (", p.label())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(prompt.contains("Title: The Seoul Years"));
        assert!(prompt.contains("Key events: moved, graduated"));
        assert!(prompt.contains("Lessons: none"));
        assert!(prompt.contains("Birth year: 1955"));
        assert!(prompt.contains("Current age: unknown"));
        assert_eq!(prompt.matches(INSUFFICIENT_INFORMATION).count(), 4);
        assert!(!prompt.contains("timeout"));
    }
}
