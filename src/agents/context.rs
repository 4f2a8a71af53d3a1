//! Render record-tool results as prompt text.

use std::fmt::Write;

use crate::models::records::{Medication, PatientRecords, PrescriptionRecord, VitalRecord};

/// Rows of each category shown in a full-record context.
const CONTEXT_ROWS: usize = 10;

fn list(values: &[String]) -> String {
    if values.is_empty() {
        "None recorded".to_string()
    } else {
        values.join(", ")
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn medication_line(medication: &Medication) -> String {
    let mut line = medication
        .medication_name
        .clone()
        .unwrap_or_else(|| "Unnamed medication".to_string());
    for part in [&medication.dosage, &medication.frequency, &medication.duration]
        .into_iter()
        .flatten()
    {
        line.push_str(", ");
        line.push_str(part);
    }
    if let Some(instructions) = &medication.instructions {
        let _ = write!(line, " ({})", instructions);
    }
    line
}

fn vital_line(out: &mut String, vital: &VitalRecord) {
    let _ = writeln!(
        out,
        "- {}: {} {} (recorded: {})",
        vital.vital_type,
        vital.value,
        vital.unit.as_deref().unwrap_or_default(),
        vital.recorded_at.format("%Y-%m-%d %H:%M UTC"),
    );
}

/// Patient profile plus the most recent rows of every category.
pub fn render_patient_records(records: &PatientRecords) -> String {
    let patient = &records.patient;
    let mut out = String::new();

    let _ = writeln!(out, "PATIENT INFORMATION:");
    let _ = writeln!(out, "Name: {}", patient.full_name());
    if let Some(age) = patient.age {
        let _ = writeln!(out, "Age: {} years", age);
    }
    let _ = writeln!(out, "Gender: {}", patient.gender);
    let _ = writeln!(out, "Blood Type: {}", or_na(patient.blood_type.as_deref()));
    let _ = writeln!(out, "Allergies: {}", list(&patient.allergies.0));
    let _ = writeln!(out, "Chronic Conditions: {}", list(&patient.chronic_conditions.0));

    let _ = writeln!(out, "\nRECENT HEALTH VITALS ({} records):", records.vitals.len());
    for vital in records.vitals.iter().take(CONTEXT_ROWS) {
        vital_line(&mut out, vital);
    }

    let _ = writeln!(out, "\nPRESCRIPTIONS ({} total):", records.prescriptions.len());
    for rx in records.prescriptions.iter().take(CONTEXT_ROWS) {
        let medications: Vec<String> = rx.medications.0.iter().map(medication_line).collect();
        let _ = writeln!(out, "- Medications: {}", list(&medications));
        let _ = writeln!(out, "  Diagnosis: {}", or_na(rx.diagnosis.as_deref()));
        if let Some(doctor) = rx.doctor_name() {
            let _ = writeln!(
                out,
                "  Prescribed by: {} ({})",
                doctor,
                or_na(rx.specialization.as_deref())
            );
        }
        let _ = writeln!(out, "  Date: {}", rx.prescribed_date);
    }

    let _ = writeln!(out, "\nMEDICAL REPORTS ({} total):", records.reports.len());
    for report in records.reports.iter().take(CONTEXT_ROWS) {
        let _ = writeln!(out, "- {} ({})", report.title, report.report_type);
        let _ = writeln!(out, "  Date: {}", report.report_date);
        if let Some(doctor) = report.doctor_name() {
            let _ = writeln!(out, "  Doctor: {}", doctor);
        }
    }

    if !records.history.is_empty() {
        let _ = writeln!(out, "\nVISIT HISTORY ({} visits):", records.history.len());
        for visit in records.history.iter().take(CONTEXT_ROWS) {
            let _ = writeln!(
                out,
                "- {} with {}: {}",
                visit.visit_date,
                visit.doctor_name,
                or_na(visit.diagnosis.as_deref())
            );
        }
    }

    out
}

pub fn render_vitals(vitals: &[VitalRecord]) -> String {
    if vitals.is_empty() {
        return "No health vitals were recorded in this period.\n".to_string();
    }
    let mut out = String::from("Health Vitals Records:\n\n");
    for vital in vitals {
        vital_line(&mut out, vital);
        if let Some(notes) = &vital.notes {
            let _ = writeln!(out, "  Notes: {}", notes);
        }
    }
    out
}

pub fn render_prescriptions(prescriptions: &[PrescriptionRecord]) -> String {
    if prescriptions.is_empty() {
        return "The patient has no active prescriptions.\n".to_string();
    }
    let mut out = String::from("Active Prescriptions:\n\n");
    for rx in prescriptions {
        let _ = writeln!(out, "Prescription ID: {}", rx.prescription_id);
        for medication in rx.medications.0.iter() {
            let _ = writeln!(out, "Medication: {}", medication_line(medication));
        }
        let _ = writeln!(out, "Diagnosis: {}", or_na(rx.diagnosis.as_deref()));
        if let Some(doctor) = rx.doctor_name() {
            let _ = writeln!(out, "Prescribed by: {}", doctor);
        }
        let _ = writeln!(out, "Specialization: {}", or_na(rx.specialization.as_deref()));
        let _ = writeln!(out, "Date: {}", rx.prescribed_date);
        match rx.valid_until {
            Some(until) => {
                let _ = writeln!(out, "Valid until: {}", until);
            }
            None => {
                let _ = writeln!(out, "Valid until: Ongoing");
            }
        }
        if let Some(notes) = &rx.notes {
            let _ = writeln!(out, "Notes: {}", notes);
        }
        out.push('\n');
    }
    out
}

/// Placeholder context for an identifier with no active patient row.
pub fn render_missing(patient_id: &str) -> String {
    format!("No patient record found for patient ID {}.", patient_id)
}
