use crate::intent::{Intent, PROPERTY_TAX_ID, WATER_BILL_ID};
use crate::outbound::{ComposedReply, ListRow, ListSection, OutboundMessageSpec};

pub const SERVICE_HEADER: &str = "Municipal Services";
pub const FAILURE_NOTICE: &str =
    "Sorry, I encountered an error processing your message. Please try again.";

const DEFAULT_PAYMENT_BASE: &str = "https://municipal.gov";
const DEFAULT_PROPERTY_TAX_DUE: &str = "₹5,250";
const DEFAULT_WATER_BILL_DUE: &str = "₹750";

/// Fixed reply content that varies per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyCatalog {
    payment_base: String,
    property_tax_due: String,
    water_bill_due: String,
}

impl Default for ReplyCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_BASE)
    }
}

impl ReplyCatalog {
    pub fn new(payment_base: impl Into<String>) -> Self {
        let payment_base: String = payment_base.into();
        Self {
            payment_base: payment_base.trim_end_matches('/').to_string(),
            property_tax_due: DEFAULT_PROPERTY_TAX_DUE.into(),
            water_bill_due: DEFAULT_WATER_BILL_DUE.into(),
        }
    }

    pub fn with_amounts(
        mut self,
        property_tax_due: impl Into<String>,
        water_bill_due: impl Into<String>,
    ) -> Self {
        self.property_tax_due = property_tax_due.into();
        self.water_bill_due = water_bill_due.into();
        self
    }

    pub fn payment_base(&self) -> &str {
        &self.payment_base
    }

    /// Replies for `intent`, in send order. Never empty.
    pub fn compose(&self, intent: &Intent, display_name: &str) -> Vec<ComposedReply> {
        let reply = match intent {
            Intent::Greeting => service_menu(display_name),
            Intent::RequestPropertyTax => {
                ComposedReply::text("Please enter your Property ID number.")
            }
            Intent::RequestWaterBill => {
                ComposedReply::text("Please enter your Water Consumer Number.")
            }
            Intent::PropertyIdSupplied(id) => ComposedReply::text(format!(
                "Thank you! Your Property Tax details:\nProperty ID: {id}\nAmount Due: {due}\n\nTo pay, visit: {base}/pay-property/{id}",
                due = self.property_tax_due,
                base = self.payment_base,
            )),
            Intent::WaterConsumerIdSupplied(id) => ComposedReply::text(format!(
                "Thank you! Your Water Bill details:\nConsumer No: {id}\nAmount Due: {due}\n\nTo pay, visit: {base}/pay-water/{id}",
                due = self.water_bill_due,
                base = self.payment_base,
            )),
            Intent::Unrecognized => ComposedReply::text(
                "I didn't understand. Please say \"hi\" to see the service menu, or directly type \"property\" or \"water\" for specific services.",
            ),
        };
        vec![reply]
    }
}

fn service_menu(display_name: &str) -> ComposedReply {
    let spec = OutboundMessageSpec::InteractiveList {
        header: SERVICE_HEADER.into(),
        body: format!(
            "Hello {display_name}, welcome to Municipal Services.\nWhat service do you need today?"
        ),
        footer: Some(SERVICE_HEADER.into()),
        button_label: "Select a Service".into(),
        sections: vec![ListSection {
            title: "Available Services".into(),
            rows: vec![
                ListRow {
                    id: PROPERTY_TAX_ID.into(),
                    title: "Property Tax".into(),
                    description: Some("Pay your property tax".into()),
                },
                ListRow {
                    id: WATER_BILL_ID.into(),
                    title: "Water Bill".into(),
                    description: Some("Pay your water bill".into()),
                },
            ],
        }],
    };
    let fallback = format!(
        "Hello {display_name}, welcome to Municipal Services.\n\nOur services:\n• Property Tax Payment\n• Water Bill Payment\n\nPlease reply with \"property\" or \"water\"."
    );
    ComposedReply::with_fallback(spec, fallback)
}
