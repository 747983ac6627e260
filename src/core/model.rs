use serde::{Deserialize, Serialize};
use std::fmt;

/// The five fixed life stages, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifePeriod {
    Childhood,
    Youth,
    MiddleAge,
    Mature,
    Elderly,
}

impl LifePeriod {
    pub const ALL: [LifePeriod; 5] = [
        LifePeriod::Childhood,
        LifePeriod::Youth,
        LifePeriod::MiddleAge,
        LifePeriod::Mature,
        LifePeriod::Elderly,
    ];

    pub fn index(self) -> usize {
        match self {
            LifePeriod::Childhood => 0,
            LifePeriod::Youth => 1,
            LifePeriod::MiddleAge => 2,
            LifePeriod::Mature => 3,
            LifePeriod::Elderly => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            LifePeriod::Childhood => "childhood",
            LifePeriod::Youth => "youth",
            LifePeriod::MiddleAge => "middle_age",
            LifePeriod::Mature => "mature",
            LifePeriod::Elderly => "elderly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LifePeriod::Childhood => "Childhood",
            LifePeriod::Youth => "Youth",
            LifePeriod::MiddleAge => "Middle Age",
            LifePeriod::Mature => "Mature Years",
            LifePeriod::Elderly => "Elderly Years",
        }
    }

    /// Heading used when the narrative is written in Korean.
    pub fn korean_label(self) -> &'static str {
        match self {
            LifePeriod::Childhood => "유년기",
            LifePeriod::Youth => "청년기",
            LifePeriod::MiddleAge => "중년기",
            LifePeriod::Mature => "장년기",
            LifePeriod::Elderly => "노년기",
        }
    }

    pub fn age_range(self) -> &'static str {
        match self {
            LifePeriod::Childhood => "ages 0-12",
            LifePeriod::Youth => "ages 13-29",
            LifePeriod::MiddleAge => "ages 30-49",
            LifePeriod::Mature => "ages 50-64",
            LifePeriod::Elderly => "ages 65 and over",
        }
    }

    /// Accepts either the key (`middle_age`) or the label (`Middle Age`), case-insensitively.
    pub fn from_label(s: &str) -> Option<Self> {
        let needle = s.trim();
        LifePeriod::ALL.into_iter().find(|p| {
            p.key().eq_ignore_ascii_case(needle)
                || p.label().eq_ignore_ascii_case(needle)
                || p.korean_label() == needle
        })
    }
}

impl fmt::Display for LifePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub author_name: String,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub current_age: Option<u32>,
    pub summary: String,
    #[serde(default)]
    pub detected_periods: Vec<String>,
    #[serde(default)]
    pub main_themes: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PeriodExtraction {
    pub period: String,
    pub age_range: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub lessons_learned: Option<String>,
    pub has_content: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chapter {
    pub period: String,
    pub title: String,
    pub content: String,
}

/// Final document. Field names and order are the wire contract for the output writer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AutobiographyResult {
    pub title: String,
    pub author_name: String,
    pub prologue: String,
    pub chapters: Vec<Chapter>,
    pub epilogue: String,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub life_lessons: Vec<String>,
}

impl AutobiographyResult {
    /// Stable-sorts chapters into canonical period order. Chapters whose period label is not
    /// recognised keep their relative order after the recognised ones.
    pub fn sort_chapters(&mut self) {
        self.chapters.sort_by_key(|c| {
            LifePeriod::from_label(&c.period)
                .map(LifePeriod::index)
                .unwrap_or(LifePeriod::ALL.len())
        });
    }
}
