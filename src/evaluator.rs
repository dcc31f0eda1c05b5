// src/evaluator.rs

use crate::models::attempt::{AnswerRecord, SubmittedAnswer};
use crate::models::question::Question;

/// Aggregate outcome of scoring one submission against an exam's questions.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub answer_records: Vec<AnswerRecord>,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub total_questions: i64,
    pub percentage: f64,
}

/// Scores a submission. Pure function: no I/O, deterministic for the same
/// inputs.
///
/// Iterates the exam's questions, not the submitted answers, so the totals
/// are based on the exam's question count. A question with no matching
/// submission is recorded as unanswered and counts as wrong. Matching is
/// strict string equality on the option key.
pub fn evaluate(questions: &[Question], submitted: &[SubmittedAnswer]) -> EvaluationResult {
    let total_questions = questions.len() as i64;
    let mut correct_count: i64 = 0;
    let mut answer_records = Vec::with_capacity(questions.len());

    for question in questions {
        let selected = submitted
            .iter()
            .find(|a| a.question_id == question.id)
            .map(|a| a.selected_option.clone());

        let correct = selected.as_deref() == Some(question.answer.as_str());
        if correct {
            correct_count += 1;
        }

        answer_records.push(AnswerRecord {
            question_id: question.id,
            question_text: question.content.clone(),
            selected_option: selected,
            correct_answer: question.answer.clone(),
            correct,
            analysis: question.analysis.clone(),
        });
    }

    let percentage = if total_questions == 0 {
        // Guard divide-by-zero for empty exams.
        0.0
    } else {
        round2(correct_count as f64 * 100.0 / total_questions as f64)
    };

    EvaluationResult {
        answer_records,
        correct_count,
        wrong_count: total_questions - correct_count,
        total_questions,
        percentage,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
