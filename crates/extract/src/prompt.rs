use crate::schema::Entity;

/// Role instruction shared by both extraction phases; pins the output
/// contract to strict JSON.
pub const SYSTEM_PROMPT: &str = "你是医疗知识图谱构建专家。必须返回严格的JSON格式。";

/// Phase one: entity candidates with chunk-local ids.
pub fn entity_prompt(chunk_text: &str) -> String {
    format!(
        r#"请分析这份急危重伤病诊疗规范文档片段，提取关键实体。

实体类型:
- Disease: 疾病/症状
- Treatment: 治疗措施
- Examination: 检查项目
- Medication: 药物
- Department: 部门/科室
- VitalSign: 生命体征指标
- Complication: 并发症

输出JSON格式(使用简单的属性值):
{{
  "entities": [
    {{"id": "d1", "type": "Disease", "name": "心脏骤停", "properties": {{"严重程度": "危重", "系统": "循环系统"}}}},
    {{"id": "t1", "type": "Treatment", "name": "心肺复苏", "properties": {{}}}}
  ]
}}

注意:
1. 只返回JSON，不要其他内容
2. ID使用简单格式: d1,d2,t1,t2,e1,e2,m1,m2等
3. properties可以为空对象{{}}
4. 每种类型最多5个实体，总数不超过30个

文档片段:
{chunk_text}
"#
    )
}

/// Phase two: relationships restricted to the entity ids already extracted
/// from the same window.
pub fn relationship_prompt(chunk_text: &str, entities: &[Entity]) -> String {
    let listing = entities
        .iter()
        .map(|e| format!("- {} ({}): {}", e.id, e.entity_type, e.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"已从这份急危重伤病诊疗规范文档片段中提取出以下实体:
{listing}

请提取这些实体之间的关系。

关系类型:
- REQUIRES_TREATMENT: 需要治疗
- REQUIRES_EXAMINATION: 需要检查
- USES_MEDICATION: 使用药物
- BELONGS_TO_DEPARTMENT: 属于科室
- MONITORS_SIGN: 监测指标
- CAUSES_COMPLICATION: 引起并发症

输出JSON格式(使用简单的属性值):
{{
  "relationships": [
    {{"from": "d1", "to": "t1", "type": "REQUIRES_TREATMENT", "properties": {{"时机": "立即"}}}}
  ]
}}

注意:
1. 只返回JSON，不要其他内容
2. from和to必须使用上面列出的实体ID
3. properties可以为空对象{{}}

文档片段:
{chunk_text}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Properties;

    #[test]
    fn test_relationship_prompt_lists_eligible_ids() {
        let entities = vec![Entity {
            id: "d1".to_string(),
            entity_type: "Disease".to_string(),
            name: "心脏骤停".to_string(),
            properties: Properties::new(),
        }];

        let prompt = relationship_prompt("文档", &entities);
        assert!(prompt.contains("- d1 (Disease): 心脏骤停"));
        assert!(prompt.contains("REQUIRES_TREATMENT"));
    }
}
