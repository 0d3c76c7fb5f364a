//! Display aggregates over already-loaded syllabus data. Pure functions,
//! no I/O; absent nesting counts as zero rather than an error.

use shared::protocol::{AssignedProgram, SemesterPlan};

/// Sum of every course's credit value across all semesters. Credits are
/// accumulated as raw `f64`; rounding happens only in `display_credits`.
pub fn syllabus_total_credits(semesters: &[SemesterPlan]) -> f64 {
    semesters.iter().map(semester_total_credits).sum()
}

pub fn semester_total_credits(semester: &SemesterPlan) -> f64 {
    semester
        .courses
        .iter()
        .map(|course| course.credit.max(0.0))
        .sum()
}

pub fn syllabus_course_count(semesters: &[SemesterPlan]) -> usize {
    semesters.iter().map(|semester| semester.courses.len()).sum()
}

/// A program's headline credit total: the backend-provided figure when it
/// carries one, otherwise the sum computed from the nested curriculum.
pub fn program_total_credits(program: &AssignedProgram) -> f64 {
    match program.total_credits {
        Some(total) if total > 0.0 => total,
        _ => syllabus_total_credits(&program.semesters),
    }
}

/// Rounding is applied at display time only, never in the accumulation.
pub fn display_credits(total: f64) -> i64 {
    total.round() as i64
}
