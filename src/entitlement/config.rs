use super::{PlanLimit, PlanLimits};
use crate::database::entities::Plan;
use serde::{Deserialize, Serialize};

/// Per-plan settings: quota, price and catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSettings {
    pub name: String,
    /// Monthly generation quota; absent means unbounded
    #[serde(default)]
    pub monthly_generations: Option<u32>,
    /// Price in cents of the billing currency
    #[serde(default)]
    pub price_cents: u64,
    /// Stripe price id used for checkout
    #[serde(default)]
    pub stripe_price_id: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    /// Shown in the public plan catalog
    #[serde(default = "default_listed")]
    pub listed: bool,
}

fn default_listed() -> bool {
    true
}

impl PlanSettings {
    pub fn limit(&self) -> PlanLimit {
        self.monthly_generations
            .map_or(PlanLimit::Unbounded, PlanLimit::Limited)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "default_free_plan")]
    pub free: PlanSettings,
    #[serde(default = "default_pro_plan")]
    pub pro: PlanSettings,
    #[serde(default = "default_enterprise_plan")]
    pub enterprise: PlanSettings,
    #[serde(default = "default_admin_plan")]
    pub admin: PlanSettings,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: default_free_plan(),
            pro: default_pro_plan(),
            enterprise: default_enterprise_plan(),
            admin: default_admin_plan(),
        }
    }
}

impl PlansConfig {
    pub fn settings(&self, plan: Plan) -> &PlanSettings {
        match plan {
            Plan::Free => &self.free,
            Plan::Pro => &self.pro,
            Plan::Enterprise => &self.enterprise,
            Plan::Admin => &self.admin,
        }
    }

    /// Snapshot of the plan to limit mapping
    pub fn limits(&self) -> PlanLimits {
        PlanLimits::new(
            self.free.limit(),
            self.pro.limit(),
            self.enterprise.limit(),
            self.admin.limit(),
        )
    }

    /// Purchasable plan whose price matches `amount_cents`
    pub fn plan_for_amount(&self, amount_cents: u64) -> Option<Plan> {
        Plan::ALL
            .into_iter()
            .filter(|plan| plan.is_purchasable())
            .find(|plan| self.settings(*plan).price_cents == amount_cents)
    }
}

fn default_free_plan() -> PlanSettings {
    PlanSettings {
        name: "Plan Gratuito".to_string(),
        monthly_generations: Some(10),
        price_cents: 0,
        stripe_price_id: None,
        features: vec![
            "10 generaciones por mes".to_string(),
            "Contenido básico".to_string(),
            "Soporte por email".to_string(),
        ],
        listed: true,
    }
}

fn default_pro_plan() -> PlanSettings {
    PlanSettings {
        name: "Plan Pro".to_string(),
        monthly_generations: Some(1000),
        price_cents: 2900,
        stripe_price_id: None,
        features: vec![
            "1000 generaciones por mes".to_string(),
            "Todos los tipos de contenido".to_string(),
            "Analytics avanzados".to_string(),
            "Soporte prioritario".to_string(),
        ],
        listed: true,
    }
}

fn default_enterprise_plan() -> PlanSettings {
    PlanSettings {
        name: "Plan Enterprise".to_string(),
        monthly_generations: None,
        price_cents: 9900,
        stripe_price_id: None,
        features: vec![
            "Generaciones ilimitadas".to_string(),
            "Soporte dedicado".to_string(),
            "Integración personalizada".to_string(),
        ],
        listed: true,
    }
}

fn default_admin_plan() -> PlanSettings {
    PlanSettings {
        name: "Admin".to_string(),
        monthly_generations: None,
        price_cents: 0,
        stripe_price_id: None,
        features: Vec::new(),
        listed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_for_amount_only_matches_purchasable_plans() {
        let plans = PlansConfig::default();
        assert_eq!(plans.plan_for_amount(2900), Some(Plan::Pro));
        assert_eq!(plans.plan_for_amount(9900), Some(Plan::Enterprise));
        // Free and Admin both cost 0 but cannot be bought
        assert_eq!(plans.plan_for_amount(0), None);
        assert_eq!(plans.plan_for_amount(1234), None);
    }

    #[test]
    fn test_admin_plan_hidden_from_catalog() {
        let plans = PlansConfig::default();
        assert!(!plans.settings(Plan::Admin).listed);
        assert!(plans.settings(Plan::Free).listed);
    }
}
