//! QoS flow mapping
//!
//! Session QoS descriptors to NGAP QoS flow items.

use ogs_asn1c::ngap::{
    AllocationAndRetentionPriority, NonDynamic5qiDescriptor, PreEmptionCapability,
    PreEmptionVulnerability, QosCharacteristics, QosFlowAddOrModifyRequestItem,
    QosFlowLevelQosParameters, QosFlowSetupRequestItem,
};

use crate::sm_context::{Arp, PreemptionCapability, PreemptionVulnerability, QosData};

/// QFI for a QoS id. Ids are decimal QFIs; anything else maps to 0.
pub fn qos_flow_id_from_qos_id(qos_id: &str) -> u8 {
    match qos_id.parse::<u8>() {
        Ok(qfi) => qfi,
        Err(_) => {
            log::warn!("QoS id [{}] is not a flow identifier, using QFI 0", qos_id);
            0
        }
    }
}

pub fn pre_emption_capability(cap: Option<PreemptionCapability>) -> PreEmptionCapability {
    match cap {
        Some(PreemptionCapability::NotPreempt) => PreEmptionCapability::ShallNotTriggerPreEmption,
        _ => PreEmptionCapability::MayTriggerPreEmption,
    }
}

pub fn pre_emption_vulnerability(vuln: Option<PreemptionVulnerability>) -> PreEmptionVulnerability {
    match vuln {
        Some(PreemptionVulnerability::Preemptable) => PreEmptionVulnerability::PreEmptable,
        _ => PreEmptionVulnerability::NotPreEmptable,
    }
}

pub fn allocation_and_retention_priority(arp: &Arp) -> AllocationAndRetentionPriority {
    AllocationAndRetentionPriority {
        priority_level_arp: arp.priority_level,
        pre_emption_capability: pre_emption_capability(arp.preempt_cap),
        pre_emption_vulnerability: pre_emption_vulnerability(arp.preempt_vuln),
    }
}

/// Non-dynamic 5QI with its ARP
pub fn qos_flow_level_parameters(five_qi: u8, arp: &Arp) -> QosFlowLevelQosParameters {
    QosFlowLevelQosParameters {
        qos_characteristics: QosCharacteristics::NonDynamic5qi(NonDynamic5qiDescriptor { five_qi }),
        allocation_and_retention_priority: allocation_and_retention_priority(arp),
    }
}

pub fn qos_flow_setup_request_item(qos: &QosData) -> QosFlowSetupRequestItem {
    QosFlowSetupRequestItem {
        qos_flow_identifier: qos_flow_id_from_qos_id(&qos.qos_id),
        qos_flow_level_qos_parameters: qos_flow_level_parameters(qos.var_5qi, &qos.arp),
    }
}

pub fn qos_flow_add_or_modify_request_item(
    qos_flow_identifier: u8,
    five_qi: u8,
    arp: &Arp,
) -> QosFlowAddOrModifyRequestItem {
    QosFlowAddOrModifyRequestItem {
        qos_flow_identifier,
        qos_flow_level_qos_parameters: Some(qos_flow_level_parameters(five_qi, arp)),
    }
}
