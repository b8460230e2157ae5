//! Scheduling fixtures: the practitioner's schedule, its two slots, the
//! clinic location, and the booked appointment.
//!
//! The slot pair is the heart of the booking scenarios. Both slots belong
//! to the same schedule on the morning of 2025-04-25; SLOT001 (09:15 to
//! 09:30) is free and SLOT002 (09:00 to 09:15) is busy, held by the
//! baseline appointment. Slot searches therefore have exactly one free
//! answer, and a time window ending before 2025-04-25 matches nothing.

use evals_types::{reference, Resource, ResourceKind};
use serde_json::json;

/// Dr. Smith's immunization schedule for the morning of 2025-04-25.
pub fn schedule(id: &str, practitioner_id: &str) -> Resource {
    Resource::build(
        ResourceKind::Schedule,
        json!({
            "id": id,
            "active": true,
            "serviceCategory": [{ "text": "General Practice" }],
            "serviceType": [{ "text": "Immunization" }],
            "specialty": [{ "text": "Clinical immunology" }],
            "actor": { "reference": reference(ResourceKind::Practitioner, practitioner_id) },
            "name": "Jane Smith - Immunization",
            "planningHorizon": {
                "start": "2025-04-25T08:00:00Z",
                "end": "2025-04-25T12:00:00Z"
            }
        }),
    )
}

/// The free 09:15 slot.
pub fn free_slot(id: &str, schedule_id: &str) -> Resource {
    slot(id, schedule_id, "free", "2025-04-25T09:15:00Z", "2025-04-25T09:30:00Z")
}

/// The busy 09:00 slot held by the baseline appointment.
pub fn busy_slot(id: &str, schedule_id: &str) -> Resource {
    slot(id, schedule_id, "busy", "2025-04-25T09:00:00Z", "2025-04-25T09:15:00Z")
}

fn slot(id: &str, schedule_id: &str, status: &str, start: &str, end: &str) -> Resource {
    Resource::build(
        ResourceKind::Slot,
        json!({
            "id": id,
            "serviceCategory": [{ "text": "General Practice" }],
            "serviceType": [{ "text": "Immunization" }],
            "specialty": [{ "text": "Clinical immunology" }],
            "appointmentType": [{ "text": "Walk-in" }],
            "schedule": { "reference": reference(ResourceKind::Schedule, schedule_id) },
            "status": status,
            "start": start,
            "end": end
        }),
    )
}

/// Main Clinic, where appointments take place.
pub fn location(id: &str) -> Resource {
    Resource::build(
        ResourceKind::Location,
        json!({
            "id": id,
            "name": "Main Clinic",
            "description": "Main clinic for general practice",
            "status": "active",
            "mode": "instance",
            "type": [{ "text": "General Practice" }],
            "telecom": [{
                "system": "phone",
                "value": "+1-555-1234",
                "use": "work"
            }],
            "address": {
                "use": "work",
                "line": ["123 Main St"],
                "city": "Boston",
                "state": "MA",
                "postalCode": "02115"
            }
        }),
    )
}

/// Booked appointment occupying the given slot. Participants are the
/// patient, the practitioner, and the location, in that order; the
/// from-slot scenario relies on the patient being first.
pub fn appointment(
    id: &str,
    patient_id: &str,
    practitioner_id: &str,
    location_id: &str,
    slot_id: &str,
) -> Resource {
    Resource::build(
        ResourceKind::Appointment,
        json!({
            "id": id,
            "status": "booked",
            "start": "2025-04-25T09:15:00Z",
            "end": "2025-04-25T09:30:00Z",
            "participant": [
                {
                    "actor": { "reference": reference(ResourceKind::Patient, patient_id) },
                    "status": "accepted"
                },
                {
                    "actor": { "reference": reference(ResourceKind::Practitioner, practitioner_id) },
                    "status": "accepted"
                },
                {
                    "actor": { "reference": reference(ResourceKind::Location, location_id) }
                }
            ],
            "slot": [{ "reference": reference(ResourceKind::Slot, slot_id) }]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_share_the_schedule_and_split_the_morning() {
        let free = free_slot("SLOT001", "SCH001");
        let busy = busy_slot("SLOT002", "SCH001");

        assert_eq!(free.json()["status"], "free");
        assert_eq!(free.json()["start"], "2025-04-25T09:15:00Z");
        assert_eq!(free.json()["end"], "2025-04-25T09:30:00Z");

        assert_eq!(busy.json()["status"], "busy");
        assert_eq!(busy.json()["start"], "2025-04-25T09:00:00Z");
        assert_eq!(busy.json()["end"], "2025-04-25T09:15:00Z");

        for slot in [&free, &busy] {
            assert_eq!(slot.json()["schedule"]["reference"], "Schedule/SCH001");
            assert_eq!(slot.json()["serviceType"][0]["text"], "Immunization");
            assert_eq!(slot.json()["appointmentType"][0]["text"], "Walk-in");
        }
    }

    #[test]
    fn schedule_belongs_to_the_practitioner() {
        let resource = schedule("SCH001", "PRACT001");
        let json = resource.json();
        assert_eq!(json["active"], true);
        assert_eq!(json["actor"]["reference"], "Practitioner/PRACT001");
        assert_eq!(json["planningHorizon"]["start"], "2025-04-25T08:00:00Z");
        assert_eq!(json["planningHorizon"]["end"], "2025-04-25T12:00:00Z");
        assert_eq!(json["name"], "Jane Smith - Immunization");
    }

    #[test]
    fn location_is_the_main_clinic() {
        let resource = location("LOC001");
        assert_eq!(resource.json()["name"], "Main Clinic");
        assert_eq!(resource.json()["mode"], "instance");
        assert_eq!(resource.json()["telecom"][0]["value"], "+1-555-1234");
        assert_eq!(resource.json()["address"]["postalCode"], "02115");
    }

    #[test]
    fn appointment_lists_patient_before_practitioner() {
        let resource = appointment("APPT001", "PAT001", "PRACT001", "LOC001", "SLOT002");
        let participants = resource.json()["participant"]
            .as_array()
            .expect("participant array");
        assert_eq!(participants.len(), 3);
        assert_eq!(participants[0]["actor"]["reference"], "Patient/PAT001");
        assert_eq!(participants[0]["status"], "accepted");
        assert_eq!(participants[1]["actor"]["reference"], "Practitioner/PRACT001");
        assert_eq!(participants[2]["actor"]["reference"], "Location/LOC001");
        assert_eq!(resource.json()["slot"][0]["reference"], "Slot/SLOT002");
        assert_eq!(resource.json()["status"], "booked");
    }
}
