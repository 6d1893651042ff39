//! HTML documents for a page: the blank submission form and the rendered greeting.
//!
//! Both are plain `Display` values so they can be written straight into a file
//! or a `String`. Anything a visitor typed goes through [`Escaped`].

use std::fmt::{self, Display, Formatter};

use crate::page::{Greeting, PageIndex};

pub const BACKGROUND_IMAGE: &str = "christmas.jpg";

pub const UPDATE_ENDPOINT: &str = "/api/update-page";

/// Text escaped for HTML element content and quoted attribute values.
pub struct Escaped<'a>(pub &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(i) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..i])?;
            f.write_str(match rest.as_bytes()[i] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            })?;
            rest = &rest[i + 1..];
        }
        f.write_str(rest)
    }
}

pub struct GreetingPage<'a> {
    pub page_index: PageIndex,
    pub greeting: &'a Greeting,
}

pub struct FormPage {
    pub page_index: PageIndex,
}

pub fn render_greeting(page_index: PageIndex, greeting: &Greeting) -> String {
    GreetingPage { page_index, greeting }.to_string()
}

pub fn render_form(page_index: PageIndex) -> String {
    FormPage { page_index }.to_string()
}

fn head(f: &mut Formatter<'_>, title: &dyn Display, style: &str) -> fmt::Result {
    writeln!(f, "<!DOCTYPE html>")?;
    writeln!(f, "<html lang=\"zh-CN\">")?;
    writeln!(f, "<head>")?;
    writeln!(f, "<meta charset=\"UTF-8\">")?;
    writeln!(f, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(f, "<title>{}</title>", title)?;
    writeln!(f, "<style>")?;
    writeln!(f, "body {{")?;
    writeln!(f, "  margin: 0;")?;
    writeln!(f, "  padding: 0;")?;
    writeln!(f, "  background: url('{}') no-repeat center center fixed;", BACKGROUND_IMAGE)?;
    writeln!(f, "  background-size: cover;")?;
    writeln!(f, "  font-family: \"Arial\", sans-serif;")?;
    writeln!(f, "  display: flex;")?;
    writeln!(f, "  justify-content: center;")?;
    writeln!(f, "  align-items: center;")?;
    writeln!(f, "  min-height: 100vh;")?;
    writeln!(f, "}}")?;
    f.write_str(style)?;
    writeln!(f, "</style>")?;
    writeln!(f, "</head>")
}

const GREETING_STYLE: &str = r#".card {
  width: 600px;
  max-width: 90vw;
  background-color: rgba(255, 255, 255, 0.92);
  border-radius: 10px;
  box-shadow: 0 4px 8px rgba(0, 0, 0, 0.2);
  padding: 24px;
  text-align: center;
  cursor: pointer;
}
.card-title {
  font-size: 36px;
  color: #e63946;
  font-family: "Cursive", sans-serif;
  text-shadow: 2px 2px 4px rgba(0, 0, 0, 0.5);
}
.hint {
  margin-top: 16px;
  color: #666;
  font-size: 16px;
  animation: pulse 1.5s ease-in-out infinite;
}
.letter {
  max-height: 0;
  overflow: hidden;
  opacity: 0;
  text-align: left;
  color: #333;
  transition: max-height 1.2s ease, opacity 1.2s ease;
}
.card.open .letter {
  max-height: 1000px;
  opacity: 1;
}
.card.open .hint {
  display: none;
}
.receiver {
  font-size: 22px;
  margin: 20px 0 10px;
}
.content {
  font-size: 18px;
  line-height: 1.6;
  white-space: pre-wrap;
  word-break: break-word;
}
.sender {
  font-size: 20px;
  margin-top: 20px;
  text-align: right;
}
@keyframes pulse {
  0%, 100% { opacity: 0.4; }
  50% { opacity: 1; }
}
"#;

const GREETING_SCRIPT: &str = r#"<script>
  const card = document.getElementById('card');
  card.addEventListener('click', () => card.classList.add('open'));
</script>
"#;

impl Display for GreetingPage<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sender = Escaped(&self.greeting.sender);
        let receiver = Escaped(&self.greeting.receiver);
        let content = Escaped(&self.greeting.content);
        head(f, &format_args!("{}写给{}的祝福", sender, receiver), GREETING_STYLE)?;
        writeln!(f, "<body>")?;
        writeln!(f, "<div id=\"card\" class=\"card\" data-page-index=\"{}\">", self.page_index)?;
        writeln!(f, "  <div class=\"card-title\">Merry Christmas</div>")?;
        writeln!(f, "  <div class=\"hint\">点击打开你的信</div>")?;
        writeln!(f, "  <div class=\"letter\">")?;
        writeln!(f, "    <div class=\"receiver\">亲爱的 {}：</div>", receiver)?;
        writeln!(f, "    <div class=\"content\">{}</div>", content)?;
        writeln!(f, "    <div class=\"sender\">—— {}</div>", sender)?;
        writeln!(f, "  </div>")?;
        writeln!(f, "</div>")?;
        f.write_str(GREETING_SCRIPT)?;
        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}

const FORM_STYLE: &str = r#".form-container {
  width: 600px;
  max-width: 90vw;
  background-color: rgba(255, 255, 255, 0.9);
  border-radius: 10px;
  box-shadow: 0 4px 8px rgba(0, 0, 0, 0.2);
  padding: 20px;
  text-align: center;
}
.form-title {
  font-size: 36px;
  color: #e63946;
  margin-bottom: 20px;
  font-family: "Cursive", sans-serif;
  text-shadow: 2px 2px 4px rgba(0, 0, 0, 0.5);
}
.form-group {
  margin-bottom: 20px;
  text-align: left;
}
.form-group label {
  font-size: 18px;
  color: #333;
  margin-bottom: 5px;
  display: block;
}
.form-group input,
.form-group textarea {
  width: 100%;
  box-sizing: border-box;
  padding: 10px;
  font-size: 16px;
  border: 1px solid #ddd;
  border-radius: 5px;
  margin-top: 5px;
}
.form-group textarea {
  resize: none;
  height: 100px;
}
.submit-btn {
  width: 100%;
  padding: 15px;
  background-color: #28a745;
  color: white;
  font-size: 18px;
  border: none;
  border-radius: 5px;
  cursor: pointer;
}
.submit-btn:hover {
  background-color: #218838;
}
.error-message, .success-message {
  margin-top: 20px;
  font-size: 18px;
}
.error-message {
  color: #dc3545;
}
.success-message {
  color: #28a745;
}
"#;

const FORM_BODY: &str = r#"<div class="form-container">
  <div class="form-title">Merry Christmas</div>
  <form id="christmasForm">
    <div class="form-group">
      <label for="sender">您是：</label>
      <input type="text" id="sender" name="sender" placeholder="请输入您的名字" required>
    </div>
    <div class="form-group">
      <label for="receiver">你想写给谁：</label>
      <input type="text" id="receiver" name="receiver" placeholder="请输入收信人的名字" required>
    </div>
    <div class="form-group">
      <label for="content">你的留言内容是：</label>
      <textarea id="content" name="content" placeholder="请输入您的留言内容" required></textarea>
    </div>
    <button type="button" class="submit-btn" onclick="submitForm()">提交</button>
  </form>
  <div id="successMessage" class="success-message" style="display: none;">提交成功！</div>
  <div id="errorMessage" class="error-message" style="display: none;">无法连接服务器，请稍后再试！</div>
</div>
"#;

const FORM_SCRIPT: &str = r#"  async function submitForm() {
    const sender = document.getElementById('sender').value;
    const receiver = document.getElementById('receiver').value;
    const content = document.getElementById('content').value;
    const success = document.getElementById('successMessage');
    const error = document.getElementById('errorMessage');

    if (!sender || !receiver || !content) {
      alert('请填写所有字段！');
      return;
    }

    try {
      const response = await fetch(UPDATE_ENDPOINT, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json', 'Accept': '*/*' },
        body: JSON.stringify({ pageIndex, sender, receiver, content })
      });
      const result = await response.json();
      if (result.success) {
        success.style.display = 'block';
        error.style.display = 'none';
        setTimeout(() => window.location.reload(), 1500);
      } else {
        success.style.display = 'none';
        error.style.display = 'block';
        error.textContent = '提交失败，请重试！';
      }
    } catch (e) {
      console.error('Error submitting form:', e);
      success.style.display = 'none';
      error.style.display = 'block';
    }
  }
"#;

impl Display for FormPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        head(f, &"写下你想对他或她说的话", FORM_STYLE)?;
        writeln!(f, "<body>")?;
        f.write_str(FORM_BODY)?;
        writeln!(f, "<script>")?;
        writeln!(f, "  const pageIndex = {};", self.page_index)?;
        writeln!(f, "  const UPDATE_ENDPOINT = '{}';", UPDATE_ENDPOINT)?;
        f.write_str(FORM_SCRIPT)?;
        writeln!(f, "</script>")?;
        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}

#[test]
fn test_escaped() {
    assert_eq!("plain text", Escaped("plain text").to_string());
    assert_eq!(
        "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;",
        Escaped("<script>alert(\"x\")</script> & '").to_string()
    );
    assert_eq!("圣诞快乐&lt;3", Escaped("圣诞快乐<3").to_string());
}

#[test]
fn test_greeting_embeds_escaped_fields() {
    let greeting = Greeting::new("Ann <b>", "Bo", "line one\n<img src=x onerror=alert(1)>");
    let html = render_greeting(4, &greeting);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("data-page-index=\"4\""));
    assert!(html.contains("亲爱的 Bo："));
    assert!(html.contains("—— Ann &lt;b&gt;"));
    assert!(html.contains("line one\n&lt;img src=x onerror=alert(1)&gt;"));
    assert!(!html.contains("<img"));
    assert!(!html.contains("<b>"));
}

#[test]
fn test_form_targets_own_index() {
    let html = render_form(17);
    assert!(html.contains("const pageIndex = 17;"));
    assert!(html.contains("const UPDATE_ENDPOINT = '/api/update-page';"));
    assert!(html.contains("id=\"christmasForm\""));
    assert_eq!(html, render_form(17));
    assert_ne!(html, render_form(18));
}
